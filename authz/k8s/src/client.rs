use crate::{Namespace, ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec};
use kube::{
    api::{Api, ListParams, PostParams},
    ResourceExt,
};
use kubetail_authz_core::{NamespaceLister, PermissionChecker, UpstreamError};
use tracing::debug;

/// Reviews access and lists namespaces through a single API client, as
/// whichever identity that client is authenticated as.
#[derive(Clone)]
pub struct KubeClient {
    client: kube::Client,
}

// === impl KubeClient ===

impl KubeClient {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

impl From<kube::Client> for KubeClient {
    fn from(client: kube::Client) -> Self {
        Self::new(client)
    }
}

#[async_trait::async_trait]
impl PermissionChecker for KubeClient {
    async fn check(
        &self,
        namespace: &str,
        verb: &str,
        resource: &str,
    ) -> Result<bool, UpstreamError> {
        let api = Api::<SelfSubjectAccessReview>::all(self.client.clone());
        let review = api
            .create(&PostParams::default(), &access_review(namespace, verb, resource))
            .await
            .map_err(|error| UpstreamError::new("failed to create SelfSubjectAccessReview", error))?;

        // A review without a status has not been allowed.
        let allowed = review.status.is_some_and(|status| status.allowed);
        debug!(%namespace, %verb, %resource, allowed, "Reviewed access");
        Ok(allowed)
    }
}

#[async_trait::async_trait]
impl NamespaceLister for KubeClient {
    async fn list_namespaces(&self) -> Result<Vec<String>, UpstreamError> {
        let api = Api::<Namespace>::all(self.client.clone());
        let namespaces = api
            .list_metadata(&ListParams::default())
            .await
            .map_err(|error| UpstreamError::new("failed to list namespaces", error))?;

        Ok(namespaces.items.iter().map(|ns| ns.name_any()).collect())
    }
}

/// Builds a review of `verb` on `resource` in `namespace`. The namespace is
/// omitted for cluster scope.
pub(crate) fn access_review(namespace: &str, verb: &str, resource: &str) -> SelfSubjectAccessReview {
    SelfSubjectAccessReview {
        spec: SelfSubjectAccessReviewSpec {
            resource_attributes: Some(ResourceAttributes {
                namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
                verb: Some(verb.to_string()),
                resource: Some(resource.to_string()),
                ..ResourceAttributes::default()
            }),
            ..SelfSubjectAccessReviewSpec::default()
        },
        ..SelfSubjectAccessReview::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, Request, Response, StatusCode};
    use http_body_util::BodyExt;
    use kube::client::Body;
    use serde_json::{json, Value};
    use tower_test::mock;

    type ApiServerHandle = mock::Handle<Request<Body>, Response<Body>>;

    fn mock_client() -> (KubeClient, ApiServerHandle) {
        let (svc, handle) = mock::pair::<Request<Body>, Response<Body>>();
        (KubeClient::new(kube::Client::new(svc, "default")), handle)
    }

    /// Answers the next API request, returning the request and its JSON body.
    async fn respond(
        handle: &mut ApiServerHandle,
        status: StatusCode,
        response: Value,
    ) -> (http::request::Parts, Value) {
        let (request, send) = handle.next_request().await.expect("service not called");
        let (parts, body) = request.into_parts();
        let body = body.collect().await.expect("request body").to_bytes();
        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).expect("request body must be JSON")
        };

        let response = serde_json::to_vec(&response).unwrap();
        send.send_response(
            Response::builder()
                .status(status)
                .body(Body::from(response))
                .unwrap(),
        );
        (parts, body)
    }

    fn reviewed(status: Option<Value>) -> Value {
        let mut review = json!({
            "apiVersion": "authorization.k8s.io/v1",
            "kind": "SelfSubjectAccessReview",
            "spec": {},
        });
        if let Some(status) = status {
            review["status"] = status;
        }
        review
    }

    fn failure(code: u16, reason: &str, message: &str) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Status",
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code,
        })
    }

    #[test]
    fn namespaced_review() {
        let review = access_review("ns1", "list", "pods");
        let attrs = review.spec.resource_attributes.unwrap();
        assert_eq!(attrs.namespace.as_deref(), Some("ns1"));
        assert_eq!(attrs.verb.as_deref(), Some("list"));
        assert_eq!(attrs.resource.as_deref(), Some("pods"));
        assert_eq!(attrs.group, None);
        assert!(review.spec.non_resource_attributes.is_none());
    }

    #[test]
    fn cluster_scoped_review() {
        let review = access_review("", "list", "pods");
        let attrs = review.spec.resource_attributes.unwrap();
        assert_eq!(attrs.namespace, None);
        assert_eq!(attrs.verb.as_deref(), Some("list"));
    }

    #[tokio::test]
    async fn cluster_scope_allowed() {
        let (client, mut handle) = mock_client();
        let (res, (parts, body)) = tokio::join!(
            client.check("", "list", "pods"),
            respond(&mut handle, StatusCode::CREATED, reviewed(Some(json!({ "allowed": true })))),
        );
        assert!(res.unwrap());

        assert_eq!(parts.method, Method::POST);
        assert_eq!(
            parts.uri.path(),
            "/apis/authorization.k8s.io/v1/selfsubjectaccessreviews"
        );
        assert_eq!(
            body["spec"]["resourceAttributes"],
            json!({ "resource": "pods", "verb": "list" }),
            "cluster scope must not send a namespace"
        );
    }

    #[tokio::test]
    async fn namespace_scope_denied() {
        let (client, mut handle) = mock_client();
        let status = json!({ "allowed": false, "reason": "no RBAC policy matched" });
        let (res, (_, body)) = tokio::join!(
            client.check("ns1", "list", "pods"),
            respond(&mut handle, StatusCode::CREATED, reviewed(Some(status))),
        );
        assert!(!res.unwrap());
        assert_eq!(body["spec"]["resourceAttributes"]["namespace"], "ns1");
    }

    #[tokio::test]
    async fn missing_status_is_denied() {
        let (client, mut handle) = mock_client();
        let (res, _) = tokio::join!(
            client.check("ns1", "list", "pods"),
            respond(&mut handle, StatusCode::CREATED, reviewed(None)),
        );
        assert!(!res.unwrap());
    }

    #[tokio::test]
    async fn failed_review_is_an_error() {
        let (client, mut handle) = mock_client();
        let (res, _) = tokio::join!(
            client.check("ns1", "list", "pods"),
            respond(
                &mut handle,
                StatusCode::INTERNAL_SERVER_ERROR,
                failure(500, "InternalError", "boom"),
            ),
        );
        let error = res.expect_err("a failed review must not be treated as denied");
        assert_eq!(error.context(), "failed to create SelfSubjectAccessReview");
        assert!(error.to_string().contains("boom"), "{error}");
    }

    #[tokio::test]
    async fn lists_namespace_names() {
        let (client, mut handle) = mock_client();
        let namespaces = json!({
            "apiVersion": "meta.k8s.io/v1",
            "kind": "PartialObjectMetadataList",
            "metadata": { "resourceVersion": "12" },
            "items": (["kube-system", "ns1"].iter().map(|name| json!({
                "apiVersion": "meta.k8s.io/v1",
                "kind": "PartialObjectMetadata",
                "metadata": { "name": name },
            })).collect::<Vec<_>>()),
        });
        let (res, (parts, _)) = tokio::join!(
            client.list_namespaces(),
            respond(&mut handle, StatusCode::OK, namespaces),
        );
        assert_eq!(res.unwrap(), ["kube-system", "ns1"]);
        assert_eq!(parts.method, Method::GET);
        assert_eq!(parts.uri.path(), "/api/v1/namespaces");
    }

    #[tokio::test]
    async fn failed_listing_is_an_error() {
        let (client, mut handle) = mock_client();
        let (res, _) = tokio::join!(
            client.list_namespaces(),
            respond(
                &mut handle,
                StatusCode::FORBIDDEN,
                failure(403, "Forbidden", "namespaces is forbidden"),
            ),
        );
        let error = res.unwrap_err();
        assert_eq!(error.context(), "failed to list namespaces");
    }
}
