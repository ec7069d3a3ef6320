// Order module: the order descriptor sent to the server, the two
// version-specific submission calls (v3 create, v2 qualify) and the
// multipart upload of the scan archive.

use crate::api::{ensure_success, ApiClient, Session};
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::blocking::multipart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything the server needs to know about an order before any file is
/// uploaded. Built once from CLI input and sent verbatim.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct OrderDescriptor {
    pub material: String,
    pub tooth_system: String,
    pub scan_files: Vec<String>,
    pub unns: Vec<u32>,
    pub preferences: Vec<String>,
}

/// v3 order creation response.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    order_id: Value,
}

/// v2 qualification response. `error` is empty on success; `order_file` is
/// the base64-encoded server-generated file that must travel inside the
/// upload archive.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QualifyResponse {
    #[serde(default)]
    error: String,
    order_id: Value,
    #[serde(default)]
    order_file_name: String,
    #[serde(default)]
    order_file: String,
}

/// Outcome of a successful v2 qualification: the assigned order id and the
/// decoded server file to bundle alongside the scans.
pub struct QualifiedOrder {
    pub order_id: String,
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl ApiClient {
    /// v3: POST the descriptor; the server validates eligibility and
    /// assigns the order id.
    pub fn create_order(&self, session: &Session, descriptor: &OrderDescriptor) -> Result<String> {
        let res = self
            .http()
            .post(self.url(self.version().submit_path()))
            .headers(session.headers())
            .json(descriptor)
            .send()
            .context("Failed to send order creation request")?;
        let res = ensure_success(res, "Order creation")?;
        let body: CreateResponse = res.json().context("Parsing order creation response json")?;
        order_id_string(&body.order_id)
    }

    /// v2: POST the descriptor to the qualification pre-check. A non-empty
    /// `error` field rejects the order before any upload happens.
    pub fn qualify_order(
        &self,
        session: &Session,
        descriptor: &OrderDescriptor,
    ) -> Result<QualifiedOrder> {
        let res = self
            .http()
            .post(self.url(self.version().submit_path()))
            .headers(session.headers())
            .json(descriptor)
            .send()
            .context("Failed to send qualification request")?;
        let res = ensure_success(res, "Qualification")?;
        let body: QualifyResponse = res.json().context("Parsing qualification response json")?;

        if !body.error.is_empty() {
            bail!("Qualification rejected the order: {}", body.error);
        }
        let order_id = order_id_string(&body.order_id)?;
        let contents = BASE64
            .decode(&body.order_file)
            .context("Decoding the qualification order file")?;
        let file_name = if body.order_file_name.is_empty() {
            format!("{}.order", order_id)
        } else {
            body.order_file_name
        };
        Ok(QualifiedOrder {
            order_id,
            file_name,
            contents,
        })
    }

    /// Upload the scan archive as multipart form data. The request content
    /// type comes from the multipart boundary, so only the session cookie
    /// and verification token are attached.
    pub fn upload_archive(
        &self,
        session: &Session,
        order_id: &str,
        archive: Vec<u8>,
    ) -> Result<()> {
        let part = multipart::Part::bytes(archive)
            .file_name("scans.zip")
            .mime_str("application/zip")
            .context("Building the upload form part")?;
        let form = multipart::Form::new().part("file", part);

        let res = self
            .http()
            .post(self.url(&self.version().upload_path(order_id)))
            .headers(session.upload_headers())
            .multipart(form)
            .send()
            .context("Failed to send upload request")?;
        ensure_success(res, "Upload")?;
        Ok(())
    }
}

/// The server returns the order id as a JSON string in v3 and as a bare
/// number in v2; both normalize to a string.
fn order_id_string(value: &Value) -> Result<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => bail!("Server returned an unusable order id: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn order_ids_accept_strings_and_numbers() {
        assert_eq!(order_id_string(&json!("A-17")).unwrap(), "A-17");
        assert_eq!(order_id_string(&json!(555)).unwrap(), "555");
        assert!(order_id_string(&json!(null)).is_err());
        assert!(order_id_string(&json!("")).is_err());
    }

    #[test]
    fn descriptor_serializes_camel_case() {
        let descriptor = OrderDescriptor {
            material: "zirconia".into(),
            tooth_system: "UNS".into(),
            scan_files: vec!["upper.stl".into(), "lower.stl".into()],
            unns: vec![11, 21],
            preferences: vec!["thin-margin".into()],
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(value["material"], "zirconia");
        assert_eq!(value["toothSystem"], "UNS");
        assert_eq!(value["scanFiles"], json!(["upper.stl", "lower.stl"]));
        assert_eq!(value["unns"], json!([11, 21]));
        assert_eq!(value["preferences"], json!(["thin-margin"]));
    }

    #[test]
    fn qualification_response_decodes_the_order_file() {
        let body: QualifyResponse = serde_json::from_value(json!({
            "error": "",
            "orderId": 555,
            "orderFileName": "555.order",
            "orderFile": BASE64.encode(b"<order/>"),
        }))
        .unwrap();
        assert!(body.error.is_empty());
        assert_eq!(order_id_string(&body.order_id).unwrap(), "555");
        assert_eq!(BASE64.decode(&body.order_file).unwrap(), b"<order/>");
    }
}
