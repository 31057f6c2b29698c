use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{
    required_i64, required_str, student_filter, to_json, with_session, Session, SessionFn,
};
use crate::ipc::types::{AppState, Request};
use crate::reports;
use serde_json::Value;

fn statistics(s: &Session<'_>, _params: &Value) -> Result<Value, HandlerErr> {
    to_json(&reports::statistics(s.conn, s.caller)?)
}

fn class_report(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let class_name = required_str(params, "className")?;
    let section = required_str(params, "section")?;
    to_json(&reports::class_statistics(s.conn, s.caller, &class_name, &section)?)
}

fn student_report(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    to_json(&reports::student_report(
        s.conn,
        s.caller,
        student_id,
        s.config.school_days,
    )?)
}

fn attendance_report(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter = student_filter(params)?;
    to_json(&reports::attendance_report(
        s.conn,
        s.caller,
        &filter,
        s.config.school_days,
    )?)
}

fn academic_report(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let filter = student_filter(params)?;
    to_json(&reports::academic_report(s.conn, s.caller, &filter)?)
}

fn insights(s: &Session<'_>, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = required_i64(params, "studentId")?;
    let filter = student_filter(params)?;
    to_json(&reports::insights(
        s.conn,
        s.caller,
        student_id,
        &filter,
        s.config.school_days,
    )?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: SessionFn = match req.method.as_str() {
        "reports.statistics" => statistics,
        "reports.class" => class_report,
        "reports.student" => student_report,
        "reports.attendance" => attendance_report,
        "reports.academic" => academic_report,
        "reports.insights" => insights,
        _ => return None,
    };
    Some(with_session(state, req, f))
}
