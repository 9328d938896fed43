use crossterm::style::Color;

#[derive(Clone, Debug)]
pub struct Theme {
    pub name: &'static str,
    /// `false` prints everything unstyled.
    pub styled: bool,
    pub accent: Color,
    pub muted: Color,
    pub success: Color,
    pub error: Color,
    pub user_color: Color,
    pub assistant_color: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark",
            styled: true,
            accent: Color::Rgb { r: 122, g: 162, b: 247 },
            muted: Color::Rgb { r: 100, g: 100, b: 100 },
            success: Color::Rgb { r: 158, g: 206, b: 106 },
            error: Color::Rgb { r: 255, g: 68, b: 68 },
            user_color: Color::Rgb { r: 106, g: 176, b: 243 },
            assistant_color: Color::Rgb { r: 224, g: 224, b: 224 },
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light",
            styled: true,
            accent: Color::DarkBlue,
            muted: Color::DarkGrey,
            success: Color::DarkGreen,
            error: Color::DarkRed,
            user_color: Color::DarkBlue,
            assistant_color: Color::Black,
        }
    }

    pub fn plain() -> Self {
        Self {
            name: "plain",
            styled: false,
            accent: Color::Reset,
            muted: Color::Reset,
            success: Color::Reset,
            error: Color::Reset,
            user_color: Color::Reset,
            assistant_color: Color::Reset,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "dark" => Some(Self::dark()),
            "light" => Some(Self::light()),
            "plain" | "none" => Some(Self::plain()),
            _ => None,
        }
    }

    pub fn all_names() -> Vec<&'static str> {
        vec!["dark", "light", "plain"]
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
