use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, AUTHORIZATION},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::domain::tag::RoutingTag;
use crate::domain::ticket::{NewTicket, Sentiment, Ticket, sort_for_dashboard};
use crate::error::{AppError, AppResult};
use crate::services::{TicketFeed, TicketStore};

const PRODUCTION_HOST: &str = "https://firestore.googleapis.com";
const PAGE_SIZE: u32 = 300;

#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub project_id: String,
    pub access_token: Option<String>,
    /// `host:port` of a local emulator; disables TLS and auth.
    pub emulator_host: Option<String>,
    pub collection_path: String,
    pub request_timeout: Duration,
}

/// Ticket store backed by the Firestore REST API.
///
/// Live notifications come from this adapter's own writes. Saves run
/// concurrently; each takes a sequence number before its request goes out and
/// is published once every earlier save has settled, so subscribers observe
/// the order in which saves were issued.
pub struct FirestoreTicketStore {
    http: Client,
    settings: FirestoreSettings,
    publisher: OrderedPublisher,
}

impl FirestoreTicketStore {
    pub fn new(settings: FirestoreSettings) -> AppResult<Self> {
        if settings.project_id.trim().is_empty() {
            return Err(AppError::Configuration(
                "Firestore project id must not be empty".to_string(),
            ));
        }
        if settings.emulator_host.is_none() && settings.access_token.is_none() {
            return Err(AppError::Configuration(
                "Firestore access token not configured".to_string(),
            ));
        }
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| AppError::Configuration(format!("failed to build store client: {err}")))?;

        info!(
            project = %settings.project_id,
            collection = %settings.collection_path,
            emulator = settings.emulator_host.is_some(),
            "Firestore ticket store configured"
        );

        Ok(Self {
            http,
            settings,
            publisher: OrderedPublisher::new(TicketFeed::new()),
        })
    }

    fn collection_url(settings: &FirestoreSettings) -> String {
        let host = match &settings.emulator_host {
            Some(host) => format!("http://{}", host.trim_end_matches('/')),
            None => PRODUCTION_HOST.to_string(),
        };
        format!(
            "{host}/v1/projects/{}/databases/(default)/documents/{}",
            settings.project_id,
            settings.collection_path.trim_matches('/')
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(ACCEPT, "application/json");
        match (&self.settings.emulator_host, &self.settings.access_token) {
            (None, Some(token)) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            _ => request,
        }
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> AppResult<ListDocumentsResponse> {
        let mut request = self
            .http
            .get(Self::collection_url(&self.settings))
            .query(&[("pageSize", PAGE_SIZE.to_string())]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| AppError::Store(format!("failed to call Firestore: {err}")))?;
        read_json(response).await
    }
}

#[async_trait]
impl TicketStore for FirestoreTicketStore {
    async fn save(&self, ticket: NewTicket) -> AppResult<Ticket> {
        let slot = self.publisher.reserve();

        let body = CreateDocumentRequest {
            fields: encode_fields(&ticket),
        };
        let request = self
            .http
            .post(Self::collection_url(&self.settings))
            .json(&body);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| AppError::Store(format!("failed to call Firestore: {err}")))?;
        let document: Document = read_json(response).await?;

        let id = document_id(&document.name)?;
        let created_at = parse_timestamp(document.create_time.as_deref())?;
        let saved = ticket.into_ticket(id, created_at);
        debug!(ticket = %saved.id, tag = saved.tag.as_str(), "ticket written to Firestore");

        slot.complete(&saved);
        Ok(saved)
    }

    async fn list_all(&self) -> AppResult<Vec<Ticket>> {
        let mut tickets = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            tickets.extend(decode_documents(page.documents));
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        sort_for_dashboard(&mut tickets);
        Ok(tickets)
    }

    fn feed(&self) -> &TicketFeed {
        &self.publisher.feed
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

/// Publishes settled saves to the feed in reservation order. A reservation
/// dropped without completing (failed or abandoned write) releases the saves
/// queued behind it.
struct OrderedPublisher {
    feed: TicketFeed,
    order: Mutex<PublishOrder>,
}

#[derive(Default)]
struct PublishOrder {
    next_reserved: u64,
    next_published: u64,
    settled: BTreeMap<u64, Option<Ticket>>,
}

struct PublishSlot<'a> {
    publisher: &'a OrderedPublisher,
    sequence: u64,
    settled: bool,
}

impl OrderedPublisher {
    fn new(feed: TicketFeed) -> Self {
        Self {
            feed,
            order: Mutex::new(PublishOrder::default()),
        }
    }

    fn reserve(&self) -> PublishSlot<'_> {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = order.next_reserved;
        order.next_reserved += 1;
        PublishSlot {
            publisher: self,
            sequence,
            settled: false,
        }
    }

    fn settle(&self, sequence: u64, ticket: Option<Ticket>) {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);
        order.settled.insert(sequence, ticket);
        loop {
            let next = order.next_published;
            let Some(ready) = order.settled.remove(&next) else {
                break;
            };
            order.next_published += 1;
            if let Some(ticket) = ready {
                self.feed.publish(&ticket);
            }
        }
    }
}

impl PublishSlot<'_> {
    fn complete(mut self, ticket: &Ticket) {
        self.settled = true;
        self.publisher.settle(self.sequence, Some(ticket.clone()));
    }
}

impl Drop for PublishSlot<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.publisher.settle(self.sequence, None);
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response>".to_string());
        return Err(AppError::Store(format!(
            "Firestore responded with {status}: {}",
            body.trim()
        )));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| AppError::Store(format!("failed to parse Firestore response: {err}")))
}

#[derive(Serialize)]
struct CreateDocumentRequest {
    fields: HashMap<&'static str, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
    create_time: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

fn encode_fields(ticket: &NewTicket) -> HashMap<&'static str, Value> {
    let mut fields = HashMap::new();
    fields.insert("originalText", json!({ "stringValue": ticket.original_text }));
    fields.insert("summary", json!({ "stringValue": ticket.summary }));
    fields.insert("tag", json!({ "stringValue": ticket.tag.as_str() }));
    // Firestore encodes 64-bit integers as strings.
    fields.insert(
        "priorityRank",
        json!({ "integerValue": ticket.priority_rank().to_string() }),
    );
    if let Some(confidence) = ticket.confidence {
        fields.insert("confidence", json!({ "doubleValue": confidence }));
    }
    if let Some(sentiment) = ticket.sentiment {
        fields.insert("sentiment", json!({ "stringValue": sentiment.as_str() }));
    }
    fields
}

/// Decodes a listing page, skipping documents that are not tickets.
fn decode_documents(documents: Vec<Document>) -> Vec<Ticket> {
    documents
        .into_iter()
        .filter_map(|document| {
            let name = document.name.clone();
            decode_ticket(document)
                .inspect_err(|err| warn!(document = %name, error = %err, "skipping undecodable ticket"))
                .ok()
        })
        .collect()
}

fn decode_ticket(document: Document) -> AppResult<Ticket> {
    let id = document_id(&document.name)?;
    let created_at = parse_timestamp(document.create_time.as_deref())?;
    let fields = &document.fields;

    // Older tickets carry a one-element `tags` array instead of `tag`.
    let tag_label = string_field(fields, "tag")
        .or_else(|| first_array_string(fields, "tags"))
        .ok_or_else(|| malformed(&id, "missing tag"))?;
    let tag = RoutingTag::from_str(tag_label)
        .ok_or_else(|| malformed(&id, &format!("unknown tag '{tag_label}'")))?;

    let ticket = NewTicket {
        original_text: string_field(fields, "originalText")
            .unwrap_or_default()
            .to_string(),
        summary: string_field(fields, "summary")
            .ok_or_else(|| malformed(&id, "missing summary"))?
            .to_string(),
        tag,
        confidence: number_field(fields, "confidence"),
        sentiment: string_field(fields, "sentiment").and_then(Sentiment::from_str),
    };
    Ok(ticket.into_ticket(id, created_at))
}

fn string_field<'a>(fields: &'a HashMap<String, Value>, name: &str) -> Option<&'a str> {
    fields.get(name)?.get("stringValue")?.as_str()
}

fn first_array_string<'a>(fields: &'a HashMap<String, Value>, name: &str) -> Option<&'a str> {
    fields
        .get(name)?
        .get("arrayValue")?
        .get("values")?
        .get(0)?
        .get("stringValue")?
        .as_str()
}

fn number_field(fields: &HashMap<String, Value>, name: &str) -> Option<f64> {
    let value = fields.get(name)?;
    if let Some(number) = value.get("doubleValue").and_then(Value::as_f64) {
        return Some(number);
    }
    value
        .get("integerValue")
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()).or_else(|| v.as_f64()))
}

fn document_id(name: &str) -> AppResult<String> {
    name.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Store(format!("Firestore returned an unnamed document '{name}'")))
}

fn parse_timestamp(value: Option<&str>) -> AppResult<DateTime<Utc>> {
    let value = value
        .ok_or_else(|| AppError::Store("Firestore document has no createTime".to_string()))?;
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| AppError::Store(format!("invalid Firestore timestamp '{value}': {err}")))
}

fn malformed(id: &str, detail: &str) -> AppError {
    AppError::Store(format!("malformed ticket document {id}: {detail}"))
}
