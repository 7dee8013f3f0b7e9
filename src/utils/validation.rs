//! 通用验证函数
//!
//! 提供集中的验证逻辑，避免在状态管理层重复验证代码

use crate::error::{AppError, AppResult};
use crate::types::{Attachment, TaskPriority, TaskStatus, UserRole};

/// 单次上传批量上限
pub const MAX_ATTACHMENTS: usize = 3;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// 验证标题非空
///
/// 返回 trim 后的字符串引用
pub fn validate_title(title: &str) -> AppResult<&str> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("标题不能为空".to_string()));
    }
    Ok(trimmed)
}

/// 验证字符串非空（通用）
pub fn validate_not_empty<'a>(value: &'a str, field_name: &str) -> AppResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} 不能为空", field_name)));
    }
    Ok(trimmed)
}

/// 验证附件批次
///
/// 整批校验：数量超限或任一文件不是 PDF，则整批拒绝，不做任何上传。
pub fn validate_attachment_batch(attachments: &[Attachment]) -> AppResult<()> {
    if attachments.len() > MAX_ATTACHMENTS {
        return Err(AppError::Attachment(format!(
            "单次最多上传 {} 个文件，收到 {} 个",
            MAX_ATTACHMENTS,
            attachments.len()
        )));
    }
    for attachment in attachments {
        if attachment.content_type != PDF_CONTENT_TYPE {
            return Err(AppError::Attachment(format!(
                "仅支持 PDF 文件: {}",
                attachment.filename
            )));
        }
    }
    Ok(())
}

/// 解析任务状态
pub fn parse_task_status(raw: &str) -> AppResult<TaskStatus> {
    match raw {
        "todo" => Ok(TaskStatus::Todo),
        "in_progress" => Ok(TaskStatus::InProgress),
        "completed" | "done" => Ok(TaskStatus::Completed),
        _ => Err(AppError::Validation(format!("未知的任务状态: {}", raw))),
    }
}

/// 解析任务优先级
pub fn parse_task_priority(raw: &str) -> AppResult<TaskPriority> {
    match raw {
        "low" => Ok(TaskPriority::Low),
        "medium" => Ok(TaskPriority::Medium),
        "high" => Ok(TaskPriority::High),
        _ => Err(AppError::Validation(format!("未知的优先级: {}", raw))),
    }
}

/// 解析用户角色
pub fn parse_user_role(raw: &str) -> AppResult<UserRole> {
    match raw {
        "admin" => Ok(UserRole::Admin),
        "user" => Ok(UserRole::User),
        _ => Err(AppError::Validation(format!("未知的角色: {}", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> Attachment {
        Attachment::new(name, "application/pdf", vec![0x25, 0x50, 0x44, 0x46])
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("  ").is_err());
        assert!(validate_title("").is_err());
        assert_eq!(validate_title("  hello  ").unwrap(), "hello");
        assert_eq!(validate_title("hello").unwrap(), "hello");
    }

    #[test]
    fn test_attachment_batch_limit() {
        let four: Vec<Attachment> = (0..4).map(|i| pdf(&format!("f{i}.pdf"))).collect();
        assert!(validate_attachment_batch(&four).is_err());

        let three: Vec<Attachment> = (0..3).map(|i| pdf(&format!("f{i}.pdf"))).collect();
        assert!(validate_attachment_batch(&three).is_ok());

        assert!(validate_attachment_batch(&[]).is_ok());
    }

    #[test]
    fn test_attachment_batch_rejects_non_pdf() {
        let mixed = vec![
            pdf("ok.pdf"),
            Attachment::new("notes.txt", "text/plain", b"hi".to_vec()),
        ];
        assert!(validate_attachment_batch(&mixed).is_err());
    }

    #[test]
    fn test_parse_task_status() {
        assert_eq!(parse_task_status("todo").unwrap(), TaskStatus::Todo);
        assert_eq!(parse_task_status("in_progress").unwrap(), TaskStatus::InProgress);
        assert_eq!(parse_task_status("done").unwrap(), TaskStatus::Completed);
        assert!(parse_task_status("unknown").is_err());
    }

    #[test]
    fn test_parse_user_role() {
        assert_eq!(parse_user_role("admin").unwrap(), UserRole::Admin);
        assert_eq!(parse_user_role("user").unwrap(), UserRole::User);
        assert!(parse_user_role("root").is_err());
    }
}
