#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
mod connections;

pub use self::{
    client::KubeClient,
    connections::{KubeConnections, LoadError},
};
pub use k8s_openapi::api::{
    authorization::v1::{ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec},
    core::v1::Namespace,
};
pub use kube::{
    config::{Kubeconfig, KubeConfigOptions},
    Client, Config,
};
