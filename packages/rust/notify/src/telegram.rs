//! Telegram Bot API sink.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use lawwatch_shared::{LawWatchError, Match, Result, TelegramConfig};

use crate::Notifier;
use crate::message::{has_document_extension, render_caption, render_html};

/// Bot API reply envelope; only the failure fields matter here.
#[derive(Debug, Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends each match to one chat, either as a link message or with the matched
/// file attached.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    /// `{api_base}/bot{token}`; never logged.
    bot_url: String,
    chat_id: String,
    description_limit: usize,
    send_as_document: bool,
}

impl TelegramNotifier {
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        token: impl AsRef<str>,
        chat_id: impl Into<String>,
        description_limit: usize,
    ) -> Self {
        Self {
            client,
            bot_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token.as_ref()),
            chat_id: chat_id.into(),
            description_limit,
            send_as_document: false,
        }
    }

    /// Build from the `[telegram]` section; `None` when credentials are unset.
    pub fn from_config(config: &TelegramConfig, client: reqwest::Client) -> Option<Self> {
        let (token, chat_id) = config.credentials()?;
        Some(
            Self::new(client, &config.api_base, token, chat_id, config.description_limit)
                .send_as_document(config.send_as_document),
        )
    }

    /// Attach matched files to `sendDocument` instead of linking them.
    pub fn send_as_document(mut self, enabled: bool) -> Self {
        self.send_as_document = enabled;
        self
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Post an HTML message to the chat.
    pub async fn send_message(&self, html: &str) -> Result<()> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": html,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        let request = self.client.post(self.method_url("sendMessage")).json(&body);
        self.deliver("sendMessage", request).await
    }

    /// Post `bytes` as a document with an HTML caption.
    pub async fn send_document(
        &self,
        file_name: String,
        bytes: Vec<u8>,
        caption: String,
    ) -> Result<()> {
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption)
            .text("parse_mode", "HTML")
            .part("document", Part::bytes(bytes).file_name(file_name));
        let request = self.client.post(self.method_url("sendDocument")).multipart(form);
        self.deliver("sendDocument", request).await
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| LawWatchError::Notify(format!("download for delivery failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| LawWatchError::Notify(format!("download for delivery failed: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.bot_url)
    }

    /// Send `request` and check the Bot API reply envelope.
    async fn deliver(&self, method: &str, request: RequestBuilder) -> Result<()> {
        let response = request.send().await.map_err(|e| {
            LawWatchError::Notify(format!("telegram {method} failed: {}", e.without_url()))
        })?;

        let status = response.status();
        let reply: Option<ApiReply> = response.json().await.ok();

        match reply {
            Some(ApiReply { ok: true, .. }) if status.is_success() => {
                debug!(method, "telegram delivery accepted");
                Ok(())
            }
            Some(ApiReply { description, .. }) => Err(LawWatchError::Notify(format!(
                "telegram rejected {method} (HTTP {status}): {}",
                description.unwrap_or_default()
            ))),
            None => Err(LawWatchError::Notify(format!(
                "telegram returned HTTP {status} with an unreadable body"
            ))),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip_all, fields(url = %matched.file_url))]
    async fn notify(&self, matched: &Match) -> Result<()> {
        if self.send_as_document && !matched.is_page_level() {
            match self.download(&matched.file_url).await {
                Ok(bytes) => {
                    let caption = render_caption(matched, self.description_limit);
                    return self
                        .send_document(document_file_name(&matched.file_url), bytes, caption)
                        .await;
                }
                Err(e) => warn!(error = %e, "sending a link instead of the document"),
            }
        }

        self.send_message(&render_html(matched, self.description_limit))
            .await
    }
}

/// Upload name for an attachment: the URL's last path segment, with `.docx`
/// added when it carries no document extension.
fn document_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();

    if segment.is_empty() || segment.contains(':') {
        "document.docx".to_string()
    } else if has_document_extension(segment) {
        segment.to_string()
    } else {
        format!("{segment}.docx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lawwatch_shared::EntryMeta;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample() -> Match {
        Match {
            project_url: "https://regulation.gov.ru/projects/42".into(),
            file_url: "https://regulation.gov.ru/api/public/Files/GetFile/abc".into(),
            keywords: vec!["связь".into()],
            meta: EntryMeta {
                title: "О связи".into(),
                description: "Проект федерального закона".into(),
                pub_date: "Tue, 07 Oct 2025 09:00:00 +0300".into(),
            },
        }
    }

    #[tokio::test]
    async fn posts_html_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botTEST:TOKEN/sendMessage"))
            .and(body_partial_json(json!({ "chat_id": "-100500", "parse_mode": "HTML" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            TelegramNotifier::new(reqwest::Client::new(), &server.uri(), "TEST:TOKEN", "-100500", 500);
        notifier.notify(&sample()).await.unwrap();
    }

    #[tokio::test]
    async fn rejection_is_a_notify_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let notifier =
            TelegramNotifier::new(reqwest::Client::new(), &server.uri(), "t", "0", 500);
        let err = notifier.notify(&sample()).await.unwrap_err();
        assert!(matches!(err, LawWatchError::Notify(_)));
        assert!(err.to_string().contains("chat not found"));
    }

    fn ok() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} }))
    }

    fn document_notifier(server: &MockServer) -> TelegramNotifier {
        TelegramNotifier::new(reqwest::Client::new(), &server.uri(), "T", "-100500", 500)
            .send_as_document(true)
    }

    #[tokio::test]
    async fn document_mode_uploads_the_matched_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-docx-body".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botT/sendDocument"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .and(body_string_contains(r#"name="document"; filename="abc.docx""#))
            .and(body_string_contains("PK-docx-body"))
            .and(body_string_contains("-100500"))
            .and(body_string_contains("Ключевые слова: <i>связь</i>"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMessage"))
            .respond_with(ok())
            .expect(0)
            .mount(&server)
            .await;

        let mut matched = sample();
        matched.file_url = format!("{}/files/abc", server.uri());
        document_notifier(&server).notify(&matched).await.unwrap();
    }

    #[tokio::test]
    async fn page_level_match_is_sent_as_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMessage"))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botT/sendDocument"))
            .respond_with(ok())
            .expect(0)
            .mount(&server)
            .await;

        let mut matched = sample();
        matched.file_url = matched.project_url.clone();
        document_notifier(&server).notify(&matched).await.unwrap();
    }

    #[tokio::test]
    async fn failed_download_falls_back_to_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botT/sendMessage"))
            .and(body_partial_json(json!({ "chat_id": "-100500" })))
            .respond_with(ok())
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/botT/sendDocument"))
            .respond_with(ok())
            .expect(0)
            .mount(&server)
            .await;

        let mut matched = sample();
        matched.file_url = format!("{}/files/gone", server.uri());
        document_notifier(&server).notify(&matched).await.unwrap();
    }

    #[test]
    fn upload_names() {
        assert_eq!(
            document_file_name("https://regulation.gov.ru/api/public/Files/GetFile/3f2504e0"),
            "3f2504e0.docx"
        );
        assert_eq!(document_file_name("https://x/files/draft.PDF?v=2"), "draft.PDF");
        assert_eq!(document_file_name("https://"), "document.docx");
    }
}
