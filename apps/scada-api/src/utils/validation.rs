//! 输入验证辅助函数
//!
//! - normalize_required：去除首尾空格并检查非空
//! - operator_context：请求体中的操作员身份 → [`OperatorContext`]
//! - parse_command：阀门命令字符串 → [`ValveCommand`]
//!
//! 失败返回 bad_request_error 响应。

use crate::utils::response::bad_request_error;
use api_contract::OperatorDto;
use axum::response::Response;
use domain::{AuthorizationLevel, OperatorContext, ValveCommand};

/// 验证必填字段，去除空格并检查非空
pub fn normalize_required(value: String, field: &str) -> Result<String, Response> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(bad_request_error(format!("{field} required")));
    }
    Ok(trimmed.to_string())
}

/// 解析操作员身份
pub fn operator_context(operator: OperatorDto) -> Result<OperatorContext, Response> {
    let id = normalize_required(operator.id, "operator.id")?;
    let name = normalize_required(operator.name, "operator.name")?;
    let level = operator
        .level
        .trim()
        .parse::<AuthorizationLevel>()
        .map_err(bad_request_error)?;
    Ok(OperatorContext::new(id, name, level))
}

/// 解析阀门命令
pub fn parse_command(raw: &str) -> Result<ValveCommand, Response> {
    raw.trim().parse::<ValveCommand>().map_err(bad_request_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn dto(level: &str) -> OperatorDto {
        OperatorDto {
            id: " op-1 ".to_string(),
            name: "Dana".to_string(),
            level: level.to_string(),
        }
    }

    #[test]
    fn operator_is_trimmed_and_parsed() {
        let ctx = operator_context(dto("Engineer")).expect("valid");
        assert_eq!(ctx.operator_id, "op-1");
        assert_eq!(ctx.level, AuthorizationLevel::Engineer);
    }

    #[test]
    fn unknown_level_is_bad_request() {
        let response = operator_context(dto("root")).expect_err("invalid");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn blank_operator_name_is_bad_request() {
        let mut operator = dto("operator");
        operator.name = "  ".to_string();
        let response = operator_context(operator).expect_err("invalid");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse_command("close").ok(), Some(ValveCommand::Close));
        assert!(parse_command("explode").is_err());
    }
}
