use std::time::Duration;
use threadgraph_core::{Entailment, EntailmentClassifier, EntailmentRequest, Error, Result};
use tokio::runtime::Runtime;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;
use tracing::{debug, info, warn};

/// Wire messages of `arg_services.mining.v1.EntailmentService`
pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EntailmentRequest {
        #[prost(string, tag = "1")]
        pub language: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub premise: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub claim: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct EntailmentResponse {
        #[prost(enumeration = "EntailmentType", tag = "1")]
        pub entailment_type: i32,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum EntailmentType {
        Unspecified = 0,
        Entailment = 1,
        Contradiction = 2,
        Neutral = 3,
    }
}

const ENTAILMENT_PATH: &str = "/arg_services.mining.v1.EntailmentService/Entailment";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

impl From<proto::EntailmentType> for Entailment {
    fn from(value: proto::EntailmentType) -> Self {
        match value {
            proto::EntailmentType::Entailment => Entailment::Entailment,
            proto::EntailmentType::Contradiction => Entailment::Contradiction,
            proto::EntailmentType::Neutral | proto::EntailmentType::Unspecified => Entailment::Neither,
        }
    }
}

/// One wire request per pair, in pair order
pub fn to_messages(request: &EntailmentRequest) -> Result<Vec<proto::EntailmentRequest>> {
    request
        .pairs
        .iter()
        .map(|(premise, claim)| {
            let text = |id: &String| {
                request
                    .texts
                    .get(id)
                    .cloned()
                    .ok_or_else(|| Error::Classifier(format!("no text for node {}", id)))
            };
            Ok(proto::EntailmentRequest {
                language: request.language.clone(),
                premise: text(premise)?,
                claim: text(claim)?,
            })
        })
        .collect()
}

/// Blocking client for a remote entailment service.
///
/// The client owns its tokio runtime so the synchronous pipeline can call it
/// from any thread, including rayon workers.
pub struct GrpcEntailmentClassifier {
    runtime: Runtime,
    channel: Channel,
    address: String,
}

impl GrpcEntailmentClassifier {
    /// Connect to `address` (`host:port` or a full `http://` uri)
    pub fn connect(address: &str) -> Result<Self> {
        let uri = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let endpoint = Endpoint::from_shared(uri)
            .map_err(|e| Error::InvalidConfig(format!("entailment address {}: {}", address, e)))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("entailment-client")
            .enable_all()
            .build()?;

        let channel = runtime
            .block_on(endpoint.connect())
            .map_err(|e| Error::Classifier(format!("cannot reach {}: {}", address, e)))?;

        info!("Connected to entailment service at {}", address);

        Ok(Self {
            runtime,
            channel,
            address: address.to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn entailment(
        channel: Channel,
        request: proto::EntailmentRequest,
    ) -> std::result::Result<proto::EntailmentResponse, Status> {
        let mut grpc = Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("service not ready: {}", e)))?;

        let codec: ProstCodec<proto::EntailmentRequest, proto::EntailmentResponse> = ProstCodec::default();
        let path = PathAndQuery::from_static(ENTAILMENT_PATH);
        grpc.unary(tonic::Request::new(request), path, codec)
            .await
            .map(tonic::Response::into_inner)
    }
}

impl EntailmentClassifier for GrpcEntailmentClassifier {
    fn classify(&self, request: &EntailmentRequest) -> Result<Vec<Entailment>> {
        let messages = to_messages(request)?;
        debug!(pairs = messages.len(), "classifying");

        self.runtime.block_on(async {
            let mut results = Vec::with_capacity(messages.len());
            for message in messages {
                let response = Self::entailment(self.channel.clone(), message)
                    .await
                    .map_err(|status| Error::Classifier(format!("{}: {}", self.address, status.message())))?;
                results.push(Entailment::from(response.entailment_type()));
            }
            Ok::<_, Error>(results)
        })
    }
}

/// Connect when an address is configured.
///
/// A service that cannot be reached counts as absent: the run continues and
/// every scheme stays unclassified.
pub fn connect_classifier(address: Option<&str>) -> Option<GrpcEntailmentClassifier> {
    let address = address?;
    match GrpcEntailmentClassifier::connect(address) {
        Ok(classifier) => Some(classifier),
        Err(e) => {
            warn!(address, error = %e, "entailment service unavailable, schemes stay unclassified");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_entailment_type_mapping() {
        assert_eq!(Entailment::from(proto::EntailmentType::Entailment), Entailment::Entailment);
        assert_eq!(Entailment::from(proto::EntailmentType::Contradiction), Entailment::Contradiction);
        assert_eq!(Entailment::from(proto::EntailmentType::Neutral), Entailment::Neither);
        assert_eq!(Entailment::from(proto::EntailmentType::Unspecified), Entailment::Neither);
    }

    #[test]
    fn test_unknown_wire_value_is_neither() {
        let bytes = proto::EntailmentResponse { entailment_type: 42 }.encode_to_vec();
        let response = proto::EntailmentResponse::decode(bytes.as_slice()).unwrap();
        assert_eq!(Entailment::from(response.entailment_type()), Entailment::Neither);
    }

    #[test]
    fn test_messages_follow_pair_order() {
        let mut request = EntailmentRequest::new("en");
        request.push("2", "No way", "1", "Cats rule");
        request.push("3", "Agreed", "1", "Cats rule");

        let messages = to_messages(&request).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].premise, "No way");
        assert_eq!(messages[1].premise, "Agreed");
        assert_eq!(messages[1].claim, "Cats rule");
        assert_eq!(messages[0].language, "en");
    }

    #[test]
    fn test_missing_text_is_classifier_error() {
        let mut request = EntailmentRequest::new("en");
        request.pairs.push(("2".to_string(), "1".to_string()));
        assert!(matches!(to_messages(&request), Err(Error::Classifier(_))));
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(GrpcEntailmentClassifier::connect("not a uri").is_err());
    }

    #[test]
    fn test_unreachable_service_is_absent() {
        assert!(matches!(
            GrpcEntailmentClassifier::connect("127.0.0.1:1"),
            Err(Error::Classifier(_))
        ));
        assert!(connect_classifier(Some("127.0.0.1:1")).is_none());
        assert!(connect_classifier(Some("not a uri")).is_none());
        assert!(connect_classifier(None).is_none());
    }
}
