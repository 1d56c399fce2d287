use crate::calc;
use crate::filters;
use crate::ipc::error::ok;
use crate::ipc::helpers::{full_view, loaded_workbook, parse_selection};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_filters_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selection = match parse_selection(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workbook = match loaded_workbook(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let options = filters::filter_options(&full_view(workbook), &selection, &state.config);
    ok(&req.id, json!(options))
}

fn handle_dashboard_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selection = match parse_selection(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workbook = match loaded_workbook(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let view = filters::apply_filters(&full_view(workbook), &selection, &state.config);
    if view.is_empty() {
        log::debug!("dashboard.compute: selection matched no records");
    } else {
        log::debug!(
            "dashboard.compute: {} of {} record(s) selected",
            view.len(),
            workbook.records.len()
        );
    }
    ok(&req.id, json!(calc::compute_dashboard(&view, &selection)))
}

fn handle_dashboard_details(state: &mut AppState, req: &Request) -> serde_json::Value {
    let selection = match parse_selection(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let workbook = match loaded_workbook(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let view = filters::apply_filters(&full_view(workbook), &selection, &state.config);
    ok(&req.id, json!(calc::compute_details(&view)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "filters.options" => Some(handle_filters_options(state, req)),
        "dashboard.compute" => Some(handle_dashboard_compute(state, req)),
        "dashboard.details" => Some(handle_dashboard_details(state, req)),
        _ => None,
    }
}
