// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

//! A thin client for the topod HTTP API.

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use topod_types::api::BuildInfo;
use topod_types::api::CdpNeighborList;
use topod_types::api::ConnectionTest;
use topod_types::api::DeviceQuery;
use topod_types::api::DiscoverRequest;
use topod_types::api::Health;
use topod_types::api::InterfaceList;
use topod_types::api::LldpNeighborList;
use topod_types::api::SessionList;
use topod_types::Device;
use topod_types::DiscoveryResult;

pub struct Client {
    baseurl: String,
    client: reqwest::Client,
}

impl Client {
    pub fn new(baseurl: &str) -> Self {
        Client {
            baseurl: baseurl.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.baseurl)
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        rsp: reqwest::Response,
    ) -> anyhow::Result<T> {
        let status = rsp.status();
        if !status.is_success() {
            let body = rsp.text().await.unwrap_or_default();
            anyhow::bail!("{path} returned {status}: {body}");
        }
        rsp.json::<T>()
            .await
            .with_context(|| format!("decoding response from {path}"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let rsp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        Self::decode(path, rsp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let rsp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        Self::decode(path, rsp).await
    }

    pub async fn build_info(&self) -> anyhow::Result<BuildInfo> {
        self.get("/build-info").await
    }

    pub async fn health(&self) -> anyhow::Result<Health> {
        self.get("/api/health").await
    }

    pub async fn sessions(&self) -> anyhow::Result<SessionList> {
        self.get("/api/sessions").await
    }

    pub async fn system_info(&self, q: &DeviceQuery) -> anyhow::Result<Device> {
        self.post("/api/snmp/system-info", q).await
    }

    pub async fn interfaces(
        &self,
        q: &DeviceQuery,
    ) -> anyhow::Result<InterfaceList> {
        self.post("/api/snmp/interfaces", q).await
    }

    pub async fn lldp_neighbors(
        &self,
        q: &DeviceQuery,
    ) -> anyhow::Result<LldpNeighborList> {
        self.post("/api/snmp/lldp-neighbors", q).await
    }

    pub async fn cdp_neighbors(
        &self,
        q: &DeviceQuery,
    ) -> anyhow::Result<CdpNeighborList> {
        self.post("/api/snmp/cdp-neighbors", q).await
    }

    pub async fn test_connection(
        &self,
        q: &DeviceQuery,
    ) -> anyhow::Result<ConnectionTest> {
        self.post("/api/snmp/test-connection", q).await
    }

    pub async fn discover(
        &self,
        req: &DiscoverRequest,
    ) -> anyhow::Result<DiscoveryResult> {
        self.post("/api/snmp/discover", req).await
    }
}

#[test]
fn test_url() {
    let c = Client::new("http://localhost:12240/");
    assert_eq!(c.url("/api/health"), "http://localhost:12240/api/health");
}
