use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

use crate::error::{PipelineError, Result};

use super::{Queue, ReceivedMessage};

/// Talks to an SQS-compatible queue over its plain HTTP Query API
/// (`Action=SendMessage`/`ReceiveMessage`/`DeleteMessage`, form-encoded,
/// XML response) rather than depending on a full AWS SDK.
pub struct SqsQueue<T> {
    client: reqwest::Client,
    queue_url: String,
    _marker: PhantomData<T>,
}

impl<T> SqsQueue<T> {
    pub fn new(queue_url: impl Into<String>) -> Self {
        SqsQueue {
            client: reqwest::Client::new(),
            queue_url: queue_url.into(),
            _marker: PhantomData,
        }
    }
}

fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let pattern = format!(r"<{tag}>(.*?)</{tag}>", tag = regex::escape(tag));
    Regex::new(&pattern)
        .ok()?
        .captures(xml)
        .map(|c| c[1].to_string())
}

fn extract_all_tag(xml: &str, tag: &str) -> Vec<String> {
    let pattern = format!(r"<{tag}>([\s\S]*?)</{tag}>", tag = regex::escape(tag));
    Regex::new(&pattern)
        .map(|re| re.captures_iter(xml).map(|c| c[1].to_string()).collect())
        .unwrap_or_default()
}

#[async_trait]
impl<T> Queue<T> for SqsQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn receive(&self, max_messages: u32) -> Result<Vec<ReceivedMessage<T>>> {
        let response = self
            .client
            .post(&self.queue_url)
            .form(&[
                ("Action", "ReceiveMessage".to_string()),
                ("MaxNumberOfMessages", max_messages.to_string()),
                ("WaitTimeSeconds", "0".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::transient_local(format!(
                "receive failed: {}",
                response.status()
            )));
        }

        let xml = response.text().await?;
        let mut received = Vec::new();
        for message_xml in extract_all_tag(&xml, "Message") {
            let receipt_handle = match extract_tag(&message_xml, "ReceiptHandle") {
                Some(h) => h,
                None => continue,
            };
            let body_text = match extract_tag(&message_xml, "Body") {
                Some(b) => b,
                None => continue,
            };
            let decoded = html_unescape(&body_text);
            match serde_json::from_str::<T>(&decoded) {
                Ok(body) => received.push(ReceivedMessage {
                    body,
                    receipt_handle,
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "dropping malformed queue message");
                }
            }
        }
        Ok(received)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.queue_url)
            .form(&[
                ("Action", "DeleteMessage"),
                ("ReceiptHandle", receipt_handle),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::transient_local(format!(
                "delete failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn send(&self, body: &T) -> Result<()> {
        let json = serde_json::to_string(body)?;
        let response = self
            .client
            .post(&self.queue_url)
            .form(&[("Action", "SendMessage"), ("MessageBody", &json)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::transient_local(format!(
                "send failed: {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Minimal unescaping for the handful of entities SQS's XML body encoding
/// actually produces.
fn html_unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tag_finds_value() {
        let xml = "<ReceiptHandle>abc123</ReceiptHandle>";
        assert_eq!(
            extract_tag(xml, "ReceiptHandle"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn extract_all_tag_finds_multiple_messages() {
        let xml = "<Message><Body>one</Body></Message><Message><Body>two</Body></Message>";
        let messages = extract_all_tag(xml, "Message");
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn unescape_handles_quoted_json() {
        let escaped = "{&quot;a&quot;:1}";
        assert_eq!(html_unescape(escaped), "{\"a\":1}");
    }
}
