// src/extraction/llm.rs

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{DocumentExtractor, ExtractionDocument, pdf_text};
use crate::config::{LlmBackend, LlmSection};
use crate::error::PipelineError;

/// Instructions for turning an invoice + packing list into PIB sheet rows.
const SYSTEM_PROMPT: &str = r#"You are an expert Indonesian customs documentation officer (PIB / CEISA).

You receive the text of a Commercial Invoice and of a Packing List.
Extract, normalize and infer the information needed to populate ALL sheets.

OUTPUT STRUCTURE
Return ONE valid JSON object. Each key is a sheet name. Each value is a LIST OF
LISTS: the first list holds the column headers, every following list is one data
row aligned to those headers.

Example:
{
  "HEADER": [["CIF", "BRUTO", "NETTO"], ["5000", "120", "100"]],
  "BARANG": [
    ["HS", "KODE BARANG", "URAIAN"],
    ["85171300", "SAP001", "Smartphone A"],
    ["85171300", "SAP002", "Smartphone B"]
  ]
}

SHEETS AND COLUMNS
- HEADER: CIF, BRUTO, NETTO, TANGGAL PERNYATAAN, KODE VALUTA
- ENTITAS: NAMA ENTITAS, ALAMAT ENTITAS
- DOKUMEN: SERI, NOMOR DOKUMEN, TANGGAL
- PENGANGKUT: NAMA PENGANGKUT
- BARANG: HS, KODE BARANG, URAIAN, KODE SATUAN, JUMLAH SATUAN, NETTO, CIF

RULES
- Dates: YYYY-MM-DD
- Numeric values: digits only, no thousands separators or currency symbols
- KODE BARANG: the SAP code (e.g. MA00041841) printed under an item description
- HS: the HS code (e.g. 39094010) printed under an item description
- BARANG: one row for EVERY item
- DOKUMEN: exactly 3 rows, for the invoice, the packing list and the GRN; the GRN row repeats the invoice data
- SERI: when no serial is given, number rows from 1
- NAMA PENGANGKUT: the carrier type, e.g. TRUCK
- KODE SATUAN: one of ST, KGM, MTR, RO; write SHT as ST
- ENTITAS: only the recipient of the goods, exactly one row
- HEADER BRUTO: gross weight or quantity from the invoice
- HEADER NETTO: net weight or quantity from the invoice
- Missing values: use ""
- Return ONLY the JSON object, no markdown fences, no commentary."#;

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Resolved endpoint configuration ready to make API calls.
#[derive(Debug, Clone)]
struct ResolvedEndpoint {
    base_url: String,
    model: String,
    api_key: String,
}

fn resolve_endpoint(llm: &LlmSection) -> Result<ResolvedEndpoint, PipelineError> {
    match llm.backend {
        LlmBackend::Ollama => Ok(ResolvedEndpoint {
            base_url: llm.ollama.base_url.clone(),
            model: llm.ollama.model.clone(),
            api_key: "ollama".to_string(), // required by the API shape, ignored by Ollama
        }),
        LlmBackend::Remote => {
            let api_key = std::env::var(&llm.remote.api_key_env).map_err(|_| {
                PipelineError::Extraction(format!(
                    "{} env var required for the remote backend",
                    llm.remote.api_key_env
                ))
            })?;
            Ok(ResolvedEndpoint {
                base_url: llm.remote.base_url.clone(),
                model: llm.remote.model.clone(),
                api_key,
            })
        }
    }
}

/// Extracts PDF text locally and asks a chat-completions model for the sheet rows.
pub struct LlmExtractor {
    client: Client,
    endpoint: ResolvedEndpoint,
    backend: LlmBackend,
    max_chars: usize,
}

impl LlmExtractor {
    pub fn new(llm: &LlmSection) -> Result<Self, PipelineError> {
        let endpoint = resolve_endpoint(llm)?;
        info!(
            backend = ?llm.backend,
            url = %endpoint.base_url,
            model = %endpoint.model,
            "LLM extractor configured"
        );
        Ok(Self {
            client: Client::new(),
            endpoint,
            backend: llm.backend,
            max_chars: llm.max_chars,
        })
    }

    /// Ollama's health endpoint sits at the server root, not under /v1.
    async fn check_ollama_health(&self) -> bool {
        let health_url = self.endpoint.base_url.trim_end_matches('/').trim_end_matches("/v1");
        match self
            .client
            .get(health_url)
            .timeout(std::time::Duration::from_secs(3))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(status = %resp.status(), "Ollama server returned non-OK status");
                false
            }
            Err(e) => {
                warn!(error = %e, "Ollama server not reachable");
                false
            }
        }
    }

    async fn complete(&self, user_content: String) -> Result<String, PipelineError> {
        let request = ChatRequest {
            model: self.endpoint.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_content,
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.endpoint.base_url.trim_end_matches('/'));
        let http_err = |e: reqwest::Error| PipelineError::Extraction(format!("LLM request failed: {e}"));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.endpoint.api_key)
            .json(&request)
            .send()
            .await
            .map_err(http_err)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Extraction(format!("LLM API error {status}: {body}")));
        }

        let chat: ChatResponse = response.json().await.map_err(http_err)?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| PipelineError::Extraction("Empty response from LLM".to_string()))
    }
}

#[async_trait]
impl DocumentExtractor for LlmExtractor {
    async fn extract(
        &self,
        invoice_pdf: &Path,
        packing_pdf: &Path,
    ) -> Result<ExtractionDocument, PipelineError> {
        let invoice = pdf_text::read_text("Invoice PDF", invoice_pdf)?;
        let packing = pdf_text::read_text("Packing list PDF", packing_pdf)?;

        if self.backend == LlmBackend::Ollama && !self.check_ollama_health().await {
            return Err(PipelineError::Extraction(format!(
                "Ollama is not running at {}. Start it with: ollama serve",
                self.endpoint.base_url
            )));
        }

        let user_content = format!(
            "COMMERCIAL INVOICE:\n\n{}\n\nPACKING LIST:\n\n{}",
            truncate_chars(&invoice, self.max_chars),
            truncate_chars(&packing, self.max_chars)
        );

        let content = self.complete(user_content).await?;
        let doc = parse_response(&content)?;
        info!(sheets = doc.sheet_names().count(), "LLM extraction parsed");
        Ok(doc)
    }
}

/// Parse a model reply into an extraction document, tolerating code fences
/// and leading reasoning text.
fn parse_response(content: &str) -> Result<ExtractionDocument, PipelineError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let json = extract_json_object(trimmed)?;
    ExtractionDocument::from_json_str(json).map_err(|e| {
        PipelineError::Extraction(format!("LLM response is not a sheet document: {e}"))
    })
}

/// The outermost `{ ... }` span of `s`.
fn extract_json_object(s: &str) -> Result<&str, PipelineError> {
    let start = s.find('{');
    let end = s.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(&s[start..=end]),
        _ => Err(PipelineError::Extraction(
            "No JSON object found in LLM response".to_string(),
        )),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fenced_response() {
        let reply = "```json\n{\"BARANG\": [[\"URAIAN\"], [\"Widget A\"]]}\n```";
        let doc = parse_response(reply).unwrap();
        assert_eq!(doc.sheet("BARANG").unwrap().rows.len(), 1);
    }

    #[test]
    fn test_parse_response_with_reasoning_prefix() {
        let reply = "<think>sheets first</think>\n{\"HEADER\": [[\"CIF\"], [\"5000\"]]}";
        let doc = parse_response(reply).unwrap();
        assert!(doc.sheet("HEADER").is_some());
    }

    #[test]
    fn test_parse_response_without_object_fails() {
        assert!(matches!(
            parse_response("sorry, no data"),
            Err(PipelineError::Extraction(_))
        ));
        assert!(parse_response("{\"HEADER\": \"oops\"}").is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("äöü", 2), "äö");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_remote_backend_needs_api_key() {
        let mut llm = LlmSection::default();
        llm.remote.api_key_env = "PIB_FILLER_TEST_UNSET_KEY".to_string();
        assert!(matches!(
            resolve_endpoint(&llm),
            Err(PipelineError::Extraction(_))
        ));
    }

    #[test]
    fn test_ollama_backend_needs_no_key() {
        let llm = LlmSection {
            backend: LlmBackend::Ollama,
            ..LlmSection::default()
        };
        let endpoint = resolve_endpoint(&llm).unwrap();
        assert_eq!(endpoint.model, "qwen3:8b");
    }
}
