use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectCaseRequest {
    pub file_name: String,
}

/// Outcome of selecting a case. `status` is either `seeded` (the document was
/// fetched, extracted and sent as the seed exchange) or `skipped` (no usable
/// document; nothing was sent or logged).
#[derive(Debug, Serialize, Deserialize)]
pub struct SelectCaseResponse {
    pub session_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub session_id: String,
    pub reply: String,
}

/// The latest interviewer/patient pair. Both sides are null until a visible
/// exchange exists; a pair written as not visible stays hidden here even
/// though its rows are in the log.
#[derive(Debug, Serialize, Deserialize)]
pub struct LatestExchangeResponse {
    pub interviewer: Option<String>,
    pub patient: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaseListResponse {
    pub files: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferenceFile {
    pub name: String,
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReferenceListResponse {
    pub files: Vec<ReferenceFile>,
}
