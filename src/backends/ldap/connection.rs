//! `ldap3` backed directory transport.
use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, SearchOptions};
use tracing::debug;

use super::directory::{
    DirectoryAttribute, DirectoryConnection, DirectoryConnector, DirectoryEntry, DirectoryError,
    SearchRequest, SearchScope,
};

impl From<LdapError> for DirectoryError {
    fn from(e: LdapError) -> Self {
        match e {
            LdapError::LdapResult { result } => DirectoryError::Result {
                code: result.rc,
                message: result.text,
            },
            other => DirectoryError::Network(other.to_string()),
        }
    }
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        // ldap3 splits values into UTF-8 text and raw bytes; we keep raw bytes only.
        let mut attributes: Vec<DirectoryAttribute> = entry
            .attrs
            .into_iter()
            .map(|(name, values)| DirectoryAttribute {
                name,
                values: values.into_iter().map(String::into_bytes).collect(),
            })
            .collect();
        attributes.extend(
            entry
                .bin_attrs
                .into_iter()
                .map(|(name, values)| DirectoryAttribute { name, values }),
        );

        DirectoryEntry {
            dn: entry.dn,
            attributes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ldap3Connector {
    url: String,
    timeout: Duration,
    tls_insecure_skip_verify: bool,
}

impl Ldap3Connector {
    /// `url` must be a full `ldap://host:port` or `ldaps://host:port` URL.
    pub fn new(url: impl Into<String>, timeout: Duration, tls_insecure_skip_verify: bool) -> Self {
        Self {
            url: url.into(),
            timeout,
            tls_insecure_skip_verify,
        }
    }
}

#[async_trait]
impl DirectoryConnector for Ldap3Connector {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_no_tls_verify(self.tls_insecure_skip_verify);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url).await?;
        tokio::spawn(async move {
            if let Err(err) = conn.drive().await {
                debug!(error = %err, "ldap connection driver stopped");
            }
        });

        Ok(Box::new(Ldap3Connection {
            ldap,
            timeout: self.timeout,
        }))
    }
}

struct Ldap3Connection {
    ldap: Ldap,
    timeout: Duration,
}

#[async_trait]
impl DirectoryConnection for Ldap3Connection {
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.ldap
            .with_timeout(self.timeout)
            .simple_bind(dn, password)
            .await?
            .success()?;
        Ok(())
    }

    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let time_limit = i32::try_from(request.time_limit.as_secs()).unwrap_or(i32::MAX);
        let options = SearchOptions::new()
            .sizelimit(request.size_limit)
            .timelimit(time_limit);

        let (entries, _) = self
            .ldap
            .with_timeout(self.timeout)
            .with_search_options(options)
            .search(
                &request.base,
                request.scope.into(),
                &request.filter,
                request.attributes.clone(),
            )
            .await?
            .success()?;

        Ok(entries
            .into_iter()
            .map(|entry| SearchEntry::construct(entry).into())
            .collect())
    }

    async fn close(&mut self) {
        if let Err(err) = self.ldap.unbind().await {
            debug!(error = %err, "ldap unbind failed");
        }
    }
}
