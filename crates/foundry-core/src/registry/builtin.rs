//! The fixed built-in capability catalog.
//!
//! Implementations live in foundry-infra; this list is what planning and
//! wiring see. Descriptions are prompt-facing.

use foundry_types::capability::Capability;

pub const WEB_SEARCH: &str = "web_search";
pub const WEB_SCRAPER: &str = "web_scraper";
pub const DATETIME_TOOL: &str = "datetime_tool";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const HTTP_REQUEST: &str = "http_request";
pub const SEND_EMAIL: &str = "send_email";
pub const READ_EMAIL: &str = "read_email";

const CATALOG: &[(&str, &str)] = &[
    (
        WEB_SEARCH,
        "Search the web using DuckDuckGo and return the top 5 results. Input: {\"query\": string}.",
    ),
    (
        WEB_SCRAPER,
        "Fetch a URL and extract clean text content from the page. Input: {\"url\": string}.",
    ),
    (
        DATETIME_TOOL,
        "Return the current date and time as a formatted string. Input: none.",
    ),
    (
        READ_FILE,
        "Read and return the content of a file at a given path. Input: {\"file_path\": string}.",
    ),
    (
        WRITE_FILE,
        "Write or append content to a file at a given path. Input: {\"file_path\": string, \"content\": string, \"mode\": \"write\"|\"append\"}.",
    ),
    (
        HTTP_REQUEST,
        "Make an HTTP GET or POST request and return the response. Input: {\"url\": string, \"method\": string, \"headers\": object, \"body\": object}.",
    ),
    (
        SEND_EMAIL,
        "Send an email via SMTP. Input: {\"to\": string, \"subject\": string, \"body\": string}.",
    ),
    (
        READ_EMAIL,
        "Read recent emails from an IMAP mailbox, newest first. Input: {\"count\": number, \"folder\": string}.",
    ),
];

/// The built-in capabilities, in catalog order.
pub fn builtin_capabilities() -> Vec<Capability> {
    CATALOG
        .iter()
        .map(|(name, description)| Capability::builtin(name, description))
        .collect()
}

pub fn is_builtin(name: &str) -> bool {
    CATALOG.iter().any(|(n, _)| *n == name)
}
