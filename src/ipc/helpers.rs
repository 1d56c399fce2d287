use crate::filters::{self, Selection, View};
use crate::ipc::error::{calc_err, err};
use crate::ipc::types::{AppState, Request, Session};
use crate::workbook::LoadedWorkbook;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn session_mut<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<(String, &'a mut Session), serde_json::Value> {
    let session_id = required_str(req, "sessionId")?;
    match state.sessions.get_mut(&session_id) {
        Some(session) => Ok((session_id, session)),
        None => Err(err(
            &req.id,
            "no_session",
            "unknown sessionId; open a session first",
            None,
        )),
    }
}

pub fn loaded_workbook<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a LoadedWorkbook, serde_json::Value> {
    let session_id = required_str(req, "sessionId")?;
    let Some(session) = state.sessions.get(&session_id) else {
        return Err(err(
            &req.id,
            "no_session",
            "unknown sessionId; open a session first",
            None,
        ));
    };
    session
        .workbook
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workbook", "load a workbook first", None))
}

pub fn parse_selection(state: &AppState, req: &Request) -> Result<Selection, serde_json::Value> {
    filters::parse_selection(req.params.get("selection"), &state.config)
        .map_err(|e| calc_err(&req.id, e))
}

pub fn full_view(workbook: &LoadedWorkbook) -> View {
    View::full(std::sync::Arc::clone(&workbook.records))
}
