//! Native implementations of the built-in capability catalog.
//!
//! Every function returns a display string; failures come back as
//! `Error ...` text so the calling model can read them as observations.
//! In mock mode every capability with a network, file or mail side effect
//! returns canned text before touching anything.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use foundry_core::registry::builtin::{
    DATETIME_TOOL, HTTP_REQUEST, READ_EMAIL, READ_FILE, SEND_EMAIL, WEB_SCRAPER, WEB_SEARCH,
    WRITE_FILE,
};
use foundry_types::config::EmailConfig;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; foundry/0.1)";
const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const SEARCH_RESULTS: usize = 5;
const SCRAPE_LIMIT: usize = 2000;
const HTTP_TEXT_LIMIT: usize = 2000;
const DEFAULT_EMAIL_COUNT: usize = 5;
const DEFAULT_FOLDER: &str = "INBOX";
const EMAIL_BODY_LIMIT: usize = 300;

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
        .expect("result link regex must compile")
});
static RESULT_SNIPPET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
        .expect("snippet regex must compile")
});
static NOISE_BLOCKS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["script", "style", "nav", "header", "footer", "aside"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("block regex must compile")
        })
        .collect()
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("tag regex must compile"));

/// Runs built-in capabilities by name.
#[derive(Debug, Clone)]
pub struct Builtins {
    http: reqwest::Client,
    email: EmailConfig,
    mock: bool,
}

impl Builtins {
    pub fn new(email: EmailConfig, mock: bool) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { http, email, mock }
    }

    /// `None` when `name` is not a built-in.
    pub async fn call(&self, name: &str, input: &Value) -> Option<String> {
        let output = match name {
            WEB_SEARCH => self.web_search(&arg(input, "query").unwrap_or_default()).await,
            WEB_SCRAPER => self.web_scraper(&arg(input, "url").unwrap_or_default()).await,
            DATETIME_TOOL => datetime_tool(),
            READ_FILE => self.read_file(&arg(input, "file_path").unwrap_or_default()).await,
            WRITE_FILE => {
                self.write_file(
                    &field(input, "file_path").unwrap_or_default(),
                    &field(input, "content").unwrap_or_default(),
                    field(input, "mode").as_deref() == Some("append"),
                )
                .await
            }
            HTTP_REQUEST => self.http_request(input).await,
            SEND_EMAIL => {
                self.send_email(
                    &field(input, "to").unwrap_or_default(),
                    &field(input, "subject").unwrap_or_default(),
                    &field(input, "body").unwrap_or_default(),
                )
                .await
            }
            READ_EMAIL => {
                let count = field(input, "count")
                    .and_then(|c| c.trim().parse::<usize>().ok())
                    .unwrap_or(DEFAULT_EMAIL_COUNT);
                let folder = field(input, "folder").unwrap_or_else(|| DEFAULT_FOLDER.to_string());
                self.read_email(count, &folder).await
            }
            _ => return None,
        };
        Some(output)
    }

    async fn web_search(&self, query: &str) -> String {
        if self.mock {
            return format!("Mock search results for: {query}");
        }
        if query.trim().is_empty() {
            return "Error performing web search: empty query".to_string();
        }

        let html = match self
            .http
            .post(SEARCH_URL)
            .form(&[("q", query)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(resp) => match resp.text().await {
                Ok(text) => text,
                Err(e) => return format!("Error performing web search: {e}"),
            },
            Err(e) => return format!("Error performing web search: {e}"),
        };

        let results = parse_search_results(&html);
        if results.is_empty() {
            return format!("No results found for: {query}");
        }
        results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}\n   URL: {}\n   {}", i + 1, r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    async fn web_scraper(&self, url: &str) -> String {
        if self.mock {
            return format!("Mock scraped content from: {url}");
        }

        let resp = match self.http.get(url).send().await.and_then(|r| r.error_for_status()) {
            Ok(resp) => resp,
            Err(e) => return format!("Error scraping URL: {e}"),
        };
        match resp.text().await {
            Ok(html) => html_to_text(&html).chars().take(SCRAPE_LIMIT).collect(),
            Err(e) => format!("Error scraping URL: {e}"),
        }
    }

    async fn http_request(&self, input: &Value) -> String {
        let url = arg(input, "url").unwrap_or_default();
        let method = field(input, "method")
            .unwrap_or_else(|| "GET".to_string())
            .to_uppercase();
        if self.mock {
            return format!("Mock HTTP {method} response from: {url}");
        }

        let mut request = match method.as_str() {
            "POST" => self.http.post(&url),
            "GET" => self.http.get(&url),
            other => return format!("Error making HTTP request: unsupported method {other}"),
        };
        if let Some(Value::Object(headers)) = input.get("headers") {
            for (key, value) in headers {
                if let Some(value) = value.as_str() {
                    request = request.header(key.as_str(), value);
                }
            }
        }
        if method == "POST" {
            if let Some(body) = input.get("body").filter(|b| !b.is_null()) {
                request = request.json(body);
            }
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => return format!("Error making HTTP request: {e}"),
        };
        let status = resp.status().as_u16();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return format!("Error making HTTP request: {e}"),
        };

        let body = match serde_json::from_str::<Value>(&text) {
            Ok(json) => serde_json::to_string_pretty(&json).unwrap_or(text),
            Err(_) => text.chars().take(HTTP_TEXT_LIMIT).collect(),
        };
        format!("Status: {status}\n{body}")
    }

    async fn read_file(&self, path: &str) -> String {
        if self.mock {
            return format!("Mock content of file: {path}");
        }
        match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                format!("Error: File not found: {path}")
            }
            Err(e) => format!("Error reading file: {e}"),
        }
    }

    async fn write_file(&self, path: &str, content: &str, append: bool) -> String {
        use tokio::io::AsyncWriteExt;

        if self.mock {
            return format!("Mock write of {} chars to file: {path}", content.chars().count());
        }
        if path.is_empty() {
            return "Error writing file: empty path".to_string();
        }
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return format!("Error writing file: {e}");
                }
            }
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .await;
        let result = match file {
            Ok(mut file) => file.write_all(content.as_bytes()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) if append => format!("Successfully appended to file: {path}"),
            Ok(()) => format!("Successfully wrote file: {path}"),
            Err(e) => format!("Error writing file: {e}"),
        }
    }

    async fn read_email(&self, count: usize, folder: &str) -> String {
        if self.mock {
            return format!("Mock email: 1 unread message in {folder}, Subject: Test Email");
        }

        let Some((user, password)) = self.credentials() else {
            return format!(
                "Error: {} and {} must be set",
                self.email.sender_env, self.email.password_env
            );
        };
        let host = self.email.resolved_imap_host();
        let port = self.email.imap_port;
        let mailbox = folder.to_string();

        // The IMAP client is blocking.
        let fetched = tokio::task::spawn_blocking(move || {
            fetch_recent(&host, port, &user, &password, &mailbox, count)
        })
        .await;

        match fetched {
            Ok(Ok(messages)) if messages.is_empty() => "No emails found.".to_string(),
            Ok(Ok(messages)) => messages
                .iter()
                .map(MailSummary::render)
                .collect::<Vec<_>>()
                .join("\n\n"),
            Ok(Err(e)) => format!("Error reading email: {e}"),
            Err(e) => format!("Error reading email: {e}"),
        }
    }

    /// Sender address and password from the configured environment variables.
    fn credentials(&self) -> Option<(String, String)> {
        let sender = std::env::var(&self.email.sender_env).unwrap_or_default();
        let password = std::env::var(&self.email.password_env).unwrap_or_default();
        (!sender.is_empty() && !password.is_empty()).then_some((sender, password))
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> String {
        if self.mock {
            return format!("Mock email sent to {to} with subject: {subject}");
        }

        let Some((sender, password)) = self.credentials() else {
            return format!(
                "Error: {} and {} must be set",
                self.email.sender_env, self.email.password_env
            );
        };

        match deliver(&self.email, &sender, &password, to, subject, body).await {
            Ok(()) => format!("Email sent successfully to {to}"),
            Err(e) => format!("Error sending email: {e}"),
        }
    }
}

async fn deliver(
    config: &EmailConfig,
    sender: &str,
    password: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> anyhow::Result<()> {
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    let message = Message::builder()
        .from(sender.parse()?)
        .to(to.parse()?)
        .subject(subject)
        .body(body.to_string())?;

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        .port(config.smtp_port)
        .credentials(Credentials::new(sender.to_string(), password.to_string()))
        .build();
    mailer.send(message).await?;
    Ok(())
}

#[derive(Debug, PartialEq)]
struct MailSummary {
    from: String,
    date: String,
    subject: String,
    body: String,
}

impl MailSummary {
    fn render(&self) -> String {
        format!(
            "From: {}\nDate: {}\nSubject: {}\nBody: {}\n{}",
            self.from,
            self.date,
            self.subject,
            self.body,
            "\u{2500}".repeat(40)
        )
    }
}

/// The latest `count` messages of `folder`, newest first.
fn fetch_recent(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    folder: &str,
    count: usize,
) -> anyhow::Result<Vec<MailSummary>> {
    let tls = native_tls::TlsConnector::builder().build()?;
    let client = imap::connect((host, port), host, &tls)?;
    let mut session = client.login(user, password).map_err(|(e, _)| e)?;

    let mailbox = session.select(folder)?;
    let Some(range) = latest_range(mailbox.exists, count) else {
        session.logout()?;
        return Ok(Vec::new());
    };

    let fetches = session.fetch(range, "RFC822")?;
    let mut messages: Vec<(u32, MailSummary)> = fetches
        .iter()
        .filter_map(|fetch| {
            let raw = fetch.body()?;
            match summarize(raw) {
                Ok(summary) => Some((fetch.message, summary)),
                Err(e) => {
                    tracing::debug!(seq = fetch.message, error = %e, "Skipping unparsable message");
                    None
                }
            }
        })
        .collect();
    session.logout()?;

    messages.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(messages.into_iter().map(|(_, summary)| summary).collect())
}

/// IMAP sequence set covering the last `count` of `exists` messages.
fn latest_range(exists: u32, count: usize) -> Option<String> {
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    if exists == 0 || count == 0 {
        return None;
    }
    let start = exists.saturating_sub(count - 1).max(1);
    Some(format!("{start}:{exists}"))
}

fn summarize(raw: &[u8]) -> Result<MailSummary, mailparse::MailParseError> {
    use mailparse::MailHeaderMap;

    let mail = mailparse::parse_mail(raw)?;
    let header = |name: &str| {
        mail.headers
            .get_first_value(name)
            .unwrap_or_else(|| "Unknown".to_string())
    };
    Ok(MailSummary {
        from: header("From"),
        date: header("Date"),
        subject: mail.headers.get_first_value("Subject").unwrap_or_default(),
        body: plain_text_body(&mail)
            .unwrap_or_default()
            .chars()
            .take(EMAIL_BODY_LIMIT)
            .collect(),
    })
}

/// A single-part body, or the first `text/plain` leaf of a multipart one.
fn plain_text_body(mail: &mailparse::ParsedMail<'_>) -> Option<String> {
    if mail.subparts.is_empty() {
        return mail.get_body().ok();
    }
    mail.subparts.iter().find_map(|part| {
        if !part.subparts.is_empty() {
            plain_text_body(part)
        } else if part.ctype.mimetype == "text/plain" {
            part.get_body().ok()
        } else {
            None
        }
    })
}

fn datetime_tool() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S (%A)").to_string()
}

/// The primary argument: the input itself when it is a string, else `input[key]`.
fn arg(input: &Value, key: &str) -> Option<String> {
    match input {
        Value::String(s) => Some(s.clone()),
        _ => field(input, key),
    }
}

fn field(input: &Value, key: &str) -> Option<String> {
    match input.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[derive(Debug, PartialEq)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

fn parse_search_results(html: &str) -> Vec<SearchResult> {
    let snippets: Vec<String> = RESULT_SNIPPET
        .captures_iter(html)
        .map(|c| clean_fragment(&c[1]))
        .collect();

    RESULT_LINK
        .captures_iter(html)
        .take(SEARCH_RESULTS)
        .enumerate()
        .map(|(i, c)| SearchResult {
            title: clean_fragment(&c[2]),
            url: resolve_result_url(&decode_entities(&c[1])),
            snippet: snippets
                .get(i)
                .cloned()
                .unwrap_or_else(|| "No snippet".to_string()),
        })
        .collect()
}

/// Result links are redirects carrying the target in `uddg`.
fn resolve_result_url(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    reqwest::Url::parse(&absolute)
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn clean_fragment(fragment: &str) -> String {
    decode_entities(&TAG.replace_all(fragment, "")).trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Visible text of a page, one non-empty line per block.
fn html_to_text(html: &str) -> String {
    let mut stripped = html.to_string();
    for block in NOISE_BLOCKS.iter() {
        stripped = block.replace_all(&stripped, "\n").into_owned();
    }
    let text = decode_entities(&TAG.replace_all(&stripped, "\n"));
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mock() -> Builtins {
        Builtins::new(EmailConfig::default(), true)
    }

    #[tokio::test]
    async fn test_mock_mode_short_circuits_side_effects() {
        let b = mock();
        assert_eq!(
            b.call(WEB_SEARCH, &json!("rust news")).await.unwrap(),
            "Mock search results for: rust news"
        );
        assert_eq!(
            b.call(WEB_SCRAPER, &json!({"url": "https://example.com"})).await.unwrap(),
            "Mock scraped content from: https://example.com"
        );
        assert_eq!(
            b.call(HTTP_REQUEST, &json!({"url": "https://api.test", "method": "post"}))
                .await
                .unwrap(),
            "Mock HTTP POST response from: https://api.test"
        );
        assert_eq!(
            b.call(SEND_EMAIL, &json!({"to": "a@b.c", "subject": "Hi", "body": "x"}))
                .await
                .unwrap(),
            "Mock email sent to a@b.c with subject: Hi"
        );
    }

    #[tokio::test]
    async fn test_unknown_name_is_none() {
        assert!(mock().call("rss_reader", &Value::Null).await.is_none());
    }

    #[tokio::test]
    async fn test_datetime_format() {
        let out = mock().call(DATETIME_TOOL, &Value::Null).await.unwrap();
        // 2026-10-18 09:30:00 (Sunday)
        assert_eq!(&out[4..5], "-");
        assert_eq!(&out[10..11], " ");
        assert!(out.ends_with(')'));
    }

    #[tokio::test]
    async fn test_write_append_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        let path_str = path.display().to_string();
        let b = Builtins::new(EmailConfig::default(), false);

        let wrote = b
            .call(WRITE_FILE, &json!({"file_path": path_str, "content": "one\n"}))
            .await
            .unwrap();
        assert!(wrote.starts_with("Successfully wrote file"));
        let appended = b
            .call(
                WRITE_FILE,
                &json!({"file_path": path_str, "content": "two\n", "mode": "append"}),
            )
            .await
            .unwrap();
        assert!(appended.starts_with("Successfully appended to file"));

        let content = b.call(READ_FILE, &json!(path_str)).await.unwrap();
        assert_eq!(content, "one\ntwo\n");

        let missing = b.call(READ_FILE, &json!({"file_path": "/nonexistent/x"})).await.unwrap();
        assert_eq!(missing, "Error: File not found: /nonexistent/x");
    }

    #[tokio::test]
    async fn test_mock_file_access_stays_off_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let path_str = path.display().to_string();
        std::fs::write(dir.path().join("existing.txt"), "real").unwrap();
        let existing = dir.path().join("existing.txt").display().to_string();
        let b = mock();

        let wrote = b
            .call(WRITE_FILE, &json!({"file_path": path_str, "content": "x"}))
            .await
            .unwrap();
        assert_eq!(wrote, format!("Mock write of 1 chars to file: {path_str}"));
        assert!(!path.exists());

        let read = b.call(READ_FILE, &json!(existing)).await.unwrap();
        assert_eq!(read, format!("Mock content of file: {existing}"));
    }

    #[tokio::test]
    async fn test_read_email_mock_and_missing_credentials() {
        assert_eq!(
            mock().call(READ_EMAIL, &json!({"count": 3})).await.unwrap(),
            "Mock email: 1 unread message in INBOX, Subject: Test Email"
        );

        let b = Builtins::new(
            EmailConfig {
                sender_env: "FOUNDRY_TEST_UNSET_SENDER".to_string(),
                password_env: "FOUNDRY_TEST_UNSET_PASSWORD".to_string(),
                ..EmailConfig::default()
            },
            false,
        );
        let out = b.call(READ_EMAIL, &json!({"folder": "Work"})).await.unwrap();
        assert!(out.starts_with("Error: FOUNDRY_TEST_UNSET_SENDER"));
    }

    #[test]
    fn test_latest_range() {
        assert_eq!(latest_range(10, 5).as_deref(), Some("6:10"));
        assert_eq!(latest_range(3, 5).as_deref(), Some("1:3"));
        assert_eq!(latest_range(1, 1).as_deref(), Some("1:1"));
        assert_eq!(latest_range(0, 5), None);
        assert_eq!(latest_range(7, 0), None);
    }

    #[test]
    fn test_summarize_multipart_prefers_plain_text() {
        let raw = b"From: Ada <ada@example.com>\r\n\
Date: Mon, 12 Oct 2026 09:00:00 +0000\r\n\
Subject: =?utf-8?q?Weekly_r=C3=A9sum=C3=A9?=\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html body</p>\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
plain body\r\n\
--b1--\r\n";
        let summary = summarize(raw).unwrap();
        assert_eq!(summary.from, "Ada <ada@example.com>");
        assert_eq!(summary.subject, "Weekly r\u{e9}sum\u{e9}");
        assert_eq!(summary.body.trim_end(), "plain body");
        assert!(summary.render().starts_with("From: Ada <ada@example.com>\nDate: Mon"));
    }

    #[test]
    fn test_summarize_missing_headers() {
        let summary = summarize(b"\r\nbody only").unwrap();
        assert_eq!(summary.from, "Unknown");
        assert_eq!(summary.date, "Unknown");
        assert_eq!(summary.subject, "");
    }

    #[tokio::test]
    async fn test_send_email_without_credentials() {
        let b = Builtins::new(
            EmailConfig {
                sender_env: "FOUNDRY_TEST_UNSET_SENDER".to_string(),
                password_env: "FOUNDRY_TEST_UNSET_PASSWORD".to_string(),
                ..EmailConfig::default()
            },
            false,
        );
        let out = b
            .call(SEND_EMAIL, &json!({"to": "a@b.c", "subject": "s", "body": "b"}))
            .await
            .unwrap();
        assert!(out.starts_with("Error: FOUNDRY_TEST_UNSET_SENDER"));
    }

    #[test]
    fn test_html_to_text_drops_noise() {
        let html = "<html><head><style>p{}</style><script>var x=1;</script></head>\
            <body><nav>Menu</nav><h1>Title</h1><p>First &amp; second</p>\
            <footer>Copyright</footer></body></html>";
        assert_eq!(html_to_text(html), "Title\nFirst & second");
    }

    #[test]
    fn test_parse_search_results() {
        let html = r#"
            <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F&amp;rut=abc">The <b>Rust</b> Language</a>
            <a class="result__snippet" href="x">A language empowering <b>everyone</b>.</a>
            <a rel="nofollow" class="result__a" href="https://example.com/plain">Plain</a>
        "#;
        let results = parse_search_results(html);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "The Rust Language");
        assert_eq!(results[0].url, "https://www.rust-lang.org/");
        assert_eq!(results[0].snippet, "A language empowering everyone.");
        assert_eq!(results[1].url, "https://example.com/plain");
        assert_eq!(results[1].snippet, "No snippet");
    }
}
