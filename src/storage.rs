use chrono::{DateTime, Utc};
use opendal::services::{Fs, Memory, S3};
use opendal::Operator;

use crate::config::StorageSettings;

pub fn build_operator(settings: &StorageSettings) -> anyhow::Result<Operator> {
    let op = match settings {
        StorageSettings::S3 { endpoint, bucket, region, access_key_id, secret_access_key } => Operator::new(
            S3::default()
                .endpoint(endpoint)
                .bucket(bucket)
                .region(region)
                .access_key_id(access_key_id)
                .secret_access_key(secret_access_key),
        )?
        .finish(),
        StorageSettings::Fs { root } => Operator::new(Fs::default().root(root))?.finish(),
        StorageSettings::Memory => Operator::new(Memory::default())?.finish(),
    };
    Ok(op)
}

/// `contact_files/YYYY/MM/<uuid>.<ext>`; the extension comes from the uploaded name.
pub fn attachment_key(file_name: &str, now: DateTime<Utc>) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    let id = uuid::Uuid::new_v4();
    match ext {
        Some(ext) => format!("contact_files/{}/{id}.{ext}", now.format("%Y/%m")),
        None => format!("contact_files/{}/{id}", now.format("%Y/%m")),
    }
}

pub async fn put(op: &Operator, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
    op.write(key, bytes).await?;
    tracing::info!(key, "stored object");
    Ok(())
}

pub async fn get(op: &Operator, key: &str) -> anyhow::Result<Vec<u8>> {
    Ok(op.read(key).await?.to_vec())
}

/// Best-effort guess for serving stored attachments back.
pub fn content_type(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "txt" => "text/plain; charset=utf-8",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn attachment_keys_are_dated_and_keep_extension() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 12, 0, 0).unwrap();
        let key = attachment_key("Rapor.PDF", now);
        assert!(key.starts_with("contact_files/2025/03/"));
        assert!(key.ends_with(".pdf"));
        assert!(!attachment_key("noext", now).contains('.'));
    }

    #[tokio::test]
    async fn memory_operator_round_trips() {
        let op = build_operator(&StorageSettings::Memory).unwrap();
        put(&op, "contact_files/x.txt", b"hello".to_vec()).await.unwrap();
        assert_eq!(get(&op, "contact_files/x.txt").await.unwrap(), b"hello");
    }
}
