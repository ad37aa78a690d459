//! JSON-over-HTTP implementation of the [`Gateway`] contract.
//!
//! Every call POSTs one envelope (`Action`, `Region`, `ProjectId` and the
//! operation parameters) to a single endpoint. Request signing is not done
//! here; point the endpoint at a signing proxy when the control plane needs
//! one.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::model::{MountPointKey, VolumeId};

use super::{
    CreateVolumeRequest, CreatedVolume, ErrorKind, Gateway, GatewayContext, GatewayError,
    GatewayFuture, MountPointPage, MountPointRequest, Operation, UpdateVolumeInfoRequest,
    VolumePage, VolumeQuery,
};

const RET_OK: i64 = 0;
const RET_RATE_LIMITED: i64 = 172;

/// Gateway that speaks JSON envelopes over HTTP.
#[derive(Clone, Debug)]
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
    context: GatewayContext,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateParams<'a> {
    volume_name: &'a str,
    size: u64,
    storage_type: &'static str,
    protocol_type: &'static str,
    charge_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remark: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    volume_id: Option<&'a str>,
    offset: u64,
    limit: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExtendParams<'a> {
    volume_id: &'a str,
    size: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateInfoParams<'a> {
    volume_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remark: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct VolumeParams<'a> {
    volume_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MountPointParams<'a> {
    volume_id: &'a str,
    vpc_id: &'a str,
    subnet_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mount_point_name: Option<&'a str>,
}

#[derive(serde::Deserialize)]
struct Acknowledged {}

impl HttpGateway {
    /// Creates a gateway posting to `endpoint` with a per-request timeout.
    #[must_use]
    pub fn new(context: GatewayContext, endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into().trim().to_owned(),
            context,
        }
    }

    /// Returns the region and project this gateway is scoped to.
    #[must_use]
    pub const fn context(&self) -> &GatewayContext {
        &self.context
    }

    async fn call<P, T>(&self, operation: Operation, params: &P) -> Result<T, GatewayError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let envelope = build_envelope(&self.context, operation, params)?;
        tracing::debug!(%operation, endpoint = %self.endpoint, "sending request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| classify_transport(operation, &err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| classify_transport(operation, &err))?;

        decode_response(operation, status.as_u16(), &body)
    }

    async fn acknowledge<P>(&self, operation: Operation, params: &P) -> Result<(), GatewayError>
    where
        P: Serialize + Sync,
    {
        self.call::<P, Acknowledged>(operation, params)
            .await
            .map(|_| ())
    }
}

impl Gateway for HttpGateway {
    fn create_volume<'a>(
        &'a self,
        request: &'a CreateVolumeRequest,
    ) -> GatewayFuture<'a, CreatedVolume> {
        Box::pin(async move {
            let params = CreateParams {
                volume_name: &request.name,
                size: request.size_gb,
                storage_type: request.storage_class.as_wire(),
                protocol_type: request.protocol.as_wire(),
                charge_type: request.charge_mode.as_wire(),
                remark: request.remark.as_deref(),
                tag: request.tag.as_deref(),
                quantity: request.quantity,
            };
            self.call(Operation::CreateVolume, &params).await
        })
    }

    fn read_volumes<'a>(&'a self, query: &'a VolumeQuery) -> GatewayFuture<'a, VolumePage> {
        Box::pin(async move {
            let params = QueryParams {
                volume_id: query.volume_id.as_deref(),
                offset: query.offset,
                limit: query.limit,
            };
            self.call(Operation::ReadVolumes, &params).await
        })
    }

    fn extend_volume<'a>(
        &'a self,
        volume_id: &'a VolumeId,
        size_gb: u64,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let params = ExtendParams {
                volume_id,
                size: size_gb,
            };
            self.acknowledge(Operation::ExtendVolume, &params).await
        })
    }

    fn update_volume_info<'a>(
        &'a self,
        request: &'a UpdateVolumeInfoRequest,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let params = UpdateInfoParams {
                volume_id: &request.volume_id,
                volume_name: request.name.as_deref(),
                remark: request.remark.as_deref(),
            };
            self.acknowledge(Operation::UpdateVolumeInfo, &params).await
        })
    }

    fn remove_volume<'a>(&'a self, volume_id: &'a VolumeId) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            self.acknowledge(Operation::RemoveVolume, &VolumeParams { volume_id })
                .await
        })
    }

    fn read_mount_points<'a>(
        &'a self,
        volume_id: &'a VolumeId,
    ) -> GatewayFuture<'a, MountPointPage> {
        Box::pin(async move {
            self.call(Operation::ReadMountPoints, &VolumeParams { volume_id })
                .await
        })
    }

    fn add_mount_point<'a>(&'a self, request: &'a MountPointRequest) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let params = MountPointParams {
                volume_id: &request.volume_id,
                vpc_id: &request.key.vpc_id,
                subnet_id: &request.key.subnet_id,
                mount_point_name: Some(&request.name),
            };
            self.acknowledge(Operation::AddMountPoint, &params).await
        })
    }

    fn remove_mount_point<'a>(
        &'a self,
        volume_id: &'a VolumeId,
        key: &'a MountPointKey,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let params = MountPointParams {
                volume_id,
                vpc_id: &key.vpc_id,
                subnet_id: &key.subnet_id,
                mount_point_name: None,
            };
            self.acknowledge(Operation::RemoveMountPoint, &params).await
        })
    }
}

fn build_envelope<P: Serialize>(
    context: &GatewayContext,
    operation: Operation,
    params: &P,
) -> Result<Map<String, Value>, GatewayError> {
    let encoded = serde_json::to_value(params)
        .map_err(|err| GatewayError::new(operation, ErrorKind::Protocol, err.to_string()))?;
    let Value::Object(mut envelope) = encoded else {
        return Err(GatewayError::new(
            operation,
            ErrorKind::Protocol,
            "parameters must encode as a JSON object",
        ));
    };
    envelope.insert(
        String::from("Action"),
        Value::String(operation.as_str().to_owned()),
    );
    envelope.insert(
        String::from("Region"),
        Value::String(context.region.clone()),
    );
    envelope.insert(
        String::from("ProjectId"),
        Value::String(context.project_id.clone()),
    );
    Ok(envelope)
}

fn decode_response<T: DeserializeOwned>(
    operation: Operation,
    status: u16,
    body: &[u8],
) -> Result<T, GatewayError> {
    if !(200..300).contains(&status) {
        let message = String::from_utf8_lossy(body).into_owned();
        return Err(GatewayError::new(operation, classify_status(status), message));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|err| GatewayError::new(operation, ErrorKind::Protocol, err.to_string()))?;
    let ret_code = value.get("RetCode").and_then(Value::as_i64).unwrap_or(RET_OK);
    if ret_code != RET_OK {
        let message = value
            .get("Message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(GatewayError::new(
            operation,
            classify_ret_code(ret_code),
            format!("RetCode {ret_code}: {message}"),
        ));
    }

    serde_json::from_value(value)
        .map_err(|err| GatewayError::new(operation, ErrorKind::Protocol, err.to_string()))
}

const fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Authorization,
        404 => ErrorKind::NotFound,
        408 => ErrorKind::Timeout,
        409 => ErrorKind::Duplicate,
        429 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Internal,
        400..=499 => ErrorKind::Validation,
        _ => ErrorKind::Protocol,
    }
}

const fn classify_ret_code(code: i64) -> ErrorKind {
    match code {
        RET_RATE_LIMITED => ErrorKind::Throttled,
        150..=169 => ErrorKind::Internal,
        170..=179 => ErrorKind::Authorization,
        180..=189 => ErrorKind::Quota,
        200..=289 => ErrorKind::Validation,
        290..=294 => ErrorKind::NotFound,
        295..=299 => ErrorKind::Duplicate,
        _ => ErrorKind::Protocol,
    }
}

fn classify_transport(operation: Operation, err: &reqwest::Error) -> GatewayError {
    let kind = if err.is_timeout() || err.is_connect() {
        ErrorKind::Timeout
    } else if err.is_builder() {
        ErrorKind::Validation
    } else if err.is_decode() || err.is_body() {
        ErrorKind::Protocol
    } else {
        ErrorKind::Internal
    };
    GatewayError::new(operation, kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(429, ErrorKind::Throttled)]
    #[case(503, ErrorKind::Internal)]
    #[case(403, ErrorKind::Authorization)]
    #[case(404, ErrorKind::NotFound)]
    #[case(409, ErrorKind::Duplicate)]
    #[case(422, ErrorKind::Validation)]
    fn http_status_is_classified(#[case] status: u16, #[case] expected: ErrorKind) {
        assert_eq!(classify_status(status), expected);
    }

    #[rstest]
    #[case(172, ErrorKind::Throttled)]
    #[case(150, ErrorKind::Internal)]
    #[case(171, ErrorKind::Authorization)]
    #[case(181, ErrorKind::Quota)]
    #[case(230, ErrorKind::Validation)]
    #[case(290, ErrorKind::NotFound)]
    #[case(296, ErrorKind::Duplicate)]
    #[case(9999, ErrorKind::Protocol)]
    fn ret_codes_are_classified(#[case] code: i64, #[case] expected: ErrorKind) {
        assert_eq!(classify_ret_code(code), expected);
    }

    #[test]
    fn envelope_carries_action_and_scope() {
        let context = GatewayContext::new("region-1", "project-1");
        let volume_id = VolumeId::new("vol-1");
        let envelope = build_envelope(
            &context,
            Operation::ExtendVolume,
            &ExtendParams {
                volume_id: &volume_id,
                size: 500,
            },
        )
        .expect("envelope");
        assert_eq!(envelope.get("Action"), Some(&Value::from("ExtendVolume")));
        assert_eq!(envelope.get("Region"), Some(&Value::from("region-1")));
        assert_eq!(envelope.get("ProjectId"), Some(&Value::from("project-1")));
        assert_eq!(envelope.get("VolumeId"), Some(&Value::from("vol-1")));
        assert_eq!(envelope.get("Size"), Some(&Value::from(500)));
    }

    #[test]
    fn decode_response_surfaces_ret_code() {
        let body = br#"{"RetCode":172,"Message":"too many requests"}"#;
        let err = decode_response::<Acknowledged>(Operation::ReadVolumes, 200, body)
            .err()
            .expect("ret code should fail");
        assert_eq!(err.kind, ErrorKind::Throttled);
        assert!(err.message.contains("too many requests"));
    }

    #[test]
    fn decode_response_parses_volume_page() {
        let body = br#"{"RetCode":0,"TotalCount":1,"DataSet":[{"VolumeId":"vol-1","Size":200,"StorageType":"Advanced","ProtocolType":"NFSv3","IsExpired":"No"}]}"#;
        let page: VolumePage =
            decode_response(Operation::ReadVolumes, 200, body).expect("page should decode");
        assert_eq!(page.total_count, 1);
        assert_eq!(page.volumes.len(), 1);
        assert_eq!(page.volumes[0].volume_id, "vol-1");
        assert_eq!(page.volumes[0].size, 200);
    }

    #[test]
    fn decode_response_rejects_garbage() {
        let err = decode_response::<VolumePage>(Operation::ReadVolumes, 200, b"not-json")
            .expect_err("garbage should fail");
        assert_eq!(err.kind, ErrorKind::Protocol);
    }
}
