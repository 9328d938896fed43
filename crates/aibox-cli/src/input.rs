//! Terminal input on a dedicated thread.
//!
//! Reads only happen on request, so the chat loop can await a line while a
//! reply is in flight and still switch to masked password entry afterwards
//! without two readers competing for stdin.

use std::io::{self, BufRead, IsTerminal, Write};
use std::sync::mpsc as std_mpsc;
use std::thread;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;

enum InputRequest {
    Line,
    Secret,
}

/// `Ok(None)` means stdin reached end of file.
type InputResult = io::Result<Option<String>>;

pub struct InputReader {
    requests: std_mpsc::Sender<InputRequest>,
    responses: mpsc::UnboundedReceiver<InputResult>,
    line_outstanding: bool,
}

impl InputReader {
    pub fn spawn() -> io::Result<Self> {
        let (req_tx, req_rx) = std_mpsc::channel::<InputRequest>();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("aibox-input".into())
            .spawn(move || {
                while let Ok(request) = req_rx.recv() {
                    let result = match request {
                        InputRequest::Line => read_line(),
                        InputRequest::Secret => read_secret(),
                    };
                    if resp_tx.send(result).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            requests: req_tx,
            responses: resp_rx,
            line_outstanding: false,
        })
    }

    /// Next input line. Cancel-safe: if dropped before completing, the line
    /// is delivered by the next call instead of being lost.
    pub async fn next_line(&mut self) -> InputResult {
        if !self.line_outstanding {
            self.send(InputRequest::Line)?;
            self.line_outstanding = true;
        }
        let result = self.recv().await;
        self.line_outstanding = false;
        result
    }

    /// Read a line without echoing it.
    pub async fn secret(&mut self) -> InputResult {
        if self.line_outstanding {
            // A line read is already running; its result is the answer.
            return self.next_line().await;
        }
        self.send(InputRequest::Secret)?;
        self.recv().await
    }

    fn send(&self, request: InputRequest) -> io::Result<()> {
        self.requests
            .send(request)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "input thread stopped"))
    }

    async fn recv(&mut self) -> InputResult {
        self.responses.recv().await.unwrap_or(Ok(None))
    }
}

fn read_line() -> InputResult {
    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn read_secret() -> InputResult {
    if !io::stdin().is_terminal() {
        return read_line();
    }

    terminal::enable_raw_mode()?;
    let result = read_secret_raw();
    terminal::disable_raw_mode()?;
    println!();
    result
}

fn read_secret_raw() -> InputResult {
    let mut secret = String::new();
    loop {
        let Event::Key(KeyEvent {
            code, modifiers, kind, ..
        }) = event::read()?
        else {
            continue;
        };
        if kind != KeyEventKind::Press {
            continue;
        }
        match code {
            KeyCode::Enter => return Ok(Some(secret)),
            KeyCode::Backspace => {
                if secret.pop().is_some() {
                    print!("\x08 \x08");
                    io::stdout().flush()?;
                }
            }
            KeyCode::Char('c') | KeyCode::Char('d') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(None);
            }
            KeyCode::Esc => return Ok(None),
            KeyCode::Char(c) => {
                secret.push(c);
                print!("*");
                io::stdout().flush()?;
            }
            _ => {}
        }
    }
}
