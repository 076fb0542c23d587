use crate::analysis::{self, AnalysisConfig};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::normalize::CellValue;

pub(super) fn parse_rows(req: &Request) -> Result<Vec<Vec<CellValue>>, serde_json::Value> {
    let Some(raw) = req.params.get("rows") else {
        return Err(err(&req.id, "bad_params", "missing params.rows", None));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("rows must be an array of cell arrays: {}", e),
            None,
        )
    })
}

fn parse_config(state: &AppState, req: &Request) -> Result<AnalysisConfig, serde_json::Value> {
    let Some(raw) = req.params.get("config") else {
        return Ok(state.config.clone());
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("config: {}", e), None))
}

fn handle_analyze(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match parse_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let config = match parse_config(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match analysis::analyze_exam(&rows, &config) {
        Ok(model) => match serde_json::to_value(&model) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, &e.code, e.message, e.details),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exam.analyze" => Some(handle_analyze(state, req)),
        _ => None,
    }
}
