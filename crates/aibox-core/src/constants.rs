/// Shared constants for aibox.

// ─── Remote endpoint ──────────────────────────────────────────────────────────

pub mod endpoints {
    pub const DEFAULT_COMPLETIONS_URL: &str = "https://api.siliconflow.cn/v1/chat/completions";
}

// ─── Default Settings ─────────────────────────────────────────────────────────

pub mod defaults {
    pub const MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Qwen-7B";
    pub const MAX_TOKENS: u32 = 10_000;
    pub const API_KEY_ENV: &str = "AIBOX_API_KEY";
    /// Directory name under the platform config dir.
    pub const APP_DIR: &str = "aibox";
}

// ─── Storage layout ───────────────────────────────────────────────────────────

pub mod storage {
    pub const USERS_FILE: &str = "users.json";
    pub const USERS_DIR: &str = "Users";
    pub const HISTORY_DIR: &str = "History";
    pub const HISTORY_EXT: &str = "json";
}

// ─── Limits ───────────────────────────────────────────────────────────────────

pub mod limits {
    /// Characters of a non-200 response body kept in the failure.
    pub const ERROR_BODY_CHARS: usize = 200;
}

// ─── Messages ─────────────────────────────────────────────────────────────────

pub mod messages {
    pub const REGISTER_OK: &str = "registration successful";
    pub const LOGIN_OK: &str = "login successful";
    pub const PASSWORD_CHANGED: &str = "password changed";
}
