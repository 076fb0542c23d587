use super::analyze::parse_rows;
use crate::convert;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn parse_seed(req: &Request) -> Option<u64> {
    req.params.get("seed").and_then(|v| v.as_u64())
}

fn handle_convert(req: &Request) -> serde_json::Value {
    let rows = match parse_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match convert::convert_exam(&rows, parse_seed(req)) {
        Ok(model) => match serde_json::to_value(&model) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, &e.code, e.message, e.details),
    }
}

fn handle_preview(req: &Request) -> serde_json::Value {
    let rows = match parse_rows(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let threshold = req
        .params
        .get("masteryThreshold")
        .and_then(|v| v.as_f64())
        .unwrap_or(75.0);
    match convert::convert_preview(&rows, parse_seed(req), threshold) {
        Ok(model) => match serde_json::to_value(&model) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "encode_failed", e.to_string(), None),
        },
        Err(e) => err(&req.id, &e.code, e.message, e.details),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exam.convert" => Some(handle_convert(req)),
        "exam.convertPreview" => Some(handle_preview(req)),
        _ => None,
    }
}
