use crate::youtube::YoutubeError;

/// 错误链中是否包含配额耗尽的错误，只用于生成提示信息，不影响控制流
pub fn is_quota_exhausted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<YoutubeError>()
            .is_some_and(YoutubeError::is_quota_exceeded)
    })
}
