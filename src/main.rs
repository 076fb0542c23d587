mod analysis;
mod convert;
mod ipc;
mod normalize;

use std::io::{self, BufRead, Write};

use anyhow::Context;

fn main() -> anyhow::Result<()> {
    let mut state = ipc::AppState::default();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line.context("read request line")?;
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply with an id we never decoded.
                writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                )?;
                stdout.flush()?;
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        )?;
        stdout.flush()?;
    }

    Ok(())
}
