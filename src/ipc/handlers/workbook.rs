use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, session_mut};
use crate::ipc::types::{AppState, Request};
use crate::records::SchemaError;
use crate::workbook;
use serde_json::json;
use std::path::PathBuf;

fn handle_workbook_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let sheet_name = req
        .params
        .get("sheetName")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.config.sheet_name.clone());

    let (session_id, session) = match session_mut(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match workbook::load_workbook(&path, &sheet_name, session.workbook.as_ref()) {
        Ok((loaded, cached)) => {
            if cached {
                log::debug!(
                    "session {} reused workbook {} loaded at {}",
                    session_id,
                    loaded.fingerprint,
                    loaded.loaded_at.to_rfc3339()
                );
            }
            let mut result = json!(loaded.report);
            result["cached"] = json!(cached);
            session.workbook = Some(loaded);
            ok(&req.id, result)
        }
        Err(e) => {
            if let Some(schema) = e.downcast_ref::<SchemaError>() {
                log::warn!("session {} rejected workbook: {}", session_id, schema);
                let details = match schema {
                    SchemaError::MissingColumns { missing } => json!({ "missing": missing }),
                    SchemaError::MissingSheet { sheet, available } => {
                        json!({ "sheet": sheet, "available": available })
                    }
                };
                return err(&req.id, "schema_error", schema.to_string(), Some(details));
            }
            log::error!("session {} failed to load workbook: {:#}", session_id, e);
            err(
                &req.id,
                "workbook_read_failed",
                format!("{e:#}"),
                Some(json!({ "path": path.to_string_lossy() })),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workbook.load" => Some(handle_workbook_load(state, req)),
        _ => None,
    }
}
