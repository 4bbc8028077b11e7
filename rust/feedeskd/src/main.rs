use std::io::{self, BufRead, Write};

use feedeskd::config::Config;
use feedeskd::{ipc, logging};
use serde_json::json;
use tracing::{info, warn};

fn main() {
    logging::init();
    let config = Config::load();
    let autoload = config.workspace.clone();
    let mut state = ipc::AppState::new(config);

    if let Some(path) = autoload {
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            warn!(workspace = %path.display(), "could not open configured workspace: {e:?}");
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "feedeskd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!("unparseable request line: {e}");
                let resp = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{resp}");
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(stdout, "{resp}");
        let _ = stdout.flush();
    }
    info!("stdin closed, exiting");
}
