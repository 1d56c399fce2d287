use crate::ipc::error::ok;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request, Session};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session_id = Uuid::new_v4().to_string();
    state.sessions.insert(
        session_id.clone(),
        Session {
            opened_at: Utc::now(),
            workbook: None,
        },
    );
    log::info!("session {} opened ({} active)", session_id, state.sessions.len());
    ok(&req.id, json!({ "sessionId": session_id }))
}

fn handle_session_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session_id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let closed = match state.sessions.remove(&session_id) {
        Some(session) => {
            let age = Utc::now() - session.opened_at;
            log::info!(
                "session {} closed after {}s",
                session_id,
                age.num_seconds()
            );
            true
        }
        None => false,
    };
    ok(&req.id, json!({ "closed": closed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.open" => Some(handle_session_open(state, req)),
        "session.close" => Some(handle_session_close(state, req)),
        _ => None,
    }
}
