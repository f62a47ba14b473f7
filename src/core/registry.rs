use crate::adapters::http::HttpClient;
use crate::adapters::probes::{
    adobe, google, gravatar, site_template, AdobeProbe, GoogleProbe, GravatarProbe, SiteTemplate,
    SiteTemplateProbe,
};
use crate::domain::ports::Probe;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Builds a probe bound to the scan's shared HTTP client.
pub type ProbeFactory = Box<dyn Fn(Arc<HttpClient>) -> Arc<dyn Probe> + Send + Sync>;

/// Name to constructor mapping, filled once at startup.
#[derive(Default)]
pub struct ProbeRegistry {
    entries: Vec<(String, ProbeFactory)>,
}

/// Probes picked for one scan, plus the requested names nobody registered.
pub struct Resolution {
    pub probes: Vec<(String, Arc<dyn Probe>)>,
    pub unknown: Vec<String>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in probe at its public address.
    pub fn builtin() -> Self {
        Self::builtin_with_base_urls(&HashMap::new())
    }

    /// Registry with every built-in probe; `base_urls` redirects probes by name.
    pub fn builtin_with_base_urls(base_urls: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();

        let base = base_urls.get(gravatar::NAME).cloned();
        registry.register(gravatar::NAME, move |client| {
            let probe = GravatarProbe::new(client);
            Arc::new(match &base {
                Some(url) => probe.with_base_url(url.clone()),
                None => probe,
            })
        });

        let base = base_urls.get(adobe::NAME).cloned();
        registry.register(adobe::NAME, move |client| {
            let probe = AdobeProbe::new(client);
            Arc::new(match &base {
                Some(url) => probe.with_base_url(url.clone()),
                None => probe,
            })
        });

        let base = base_urls.get(google::NAME).cloned();
        registry.register(google::NAME, move |client| {
            let probe = GoogleProbe::new(client);
            Arc::new(match &base {
                Some(url) => probe.with_base_url(url.clone()),
                None => probe,
            })
        });

        let site = match base_urls.get(site_template::NAME) {
            Some(url) => SiteTemplate::example().with_base_url(url.clone()),
            None => SiteTemplate::example(),
        };
        registry.register_template(site);

        registry
    }

    /// Adds `factory` under `name`, replacing an earlier entry of the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Arc<HttpClient>) -> Arc<dyn Probe> + Send + Sync + 'static,
    {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            tracing::warn!("Probe '{}' registered twice, keeping the latest", name);
            entry.1 = Box::new(factory);
        } else {
            self.entries.push((name, Box::new(factory)));
        }
    }

    /// Registers a templated site under its own name.
    pub fn register_template(&mut self, site: SiteTemplate) {
        let name = site.name().to_string();
        self.register(name, move |client| {
            Arc::new(SiteTemplateProbe::new(client, site.clone()))
        });
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Instantiates the selected probes in selection order.
    ///
    /// An empty selection means every registered probe, in registration
    /// order. Unknown names are skipped with a warning and reported back in
    /// [`Resolution::unknown`]; repeated names resolve once.
    pub fn resolve(&self, names: &[String], client: &Arc<HttpClient>) -> Resolution {
        if names.is_empty() {
            let probes = self
                .entries
                .iter()
                .map(|(name, factory)| (name.clone(), factory(Arc::clone(client))))
                .collect();
            return Resolution {
                probes,
                unknown: Vec::new(),
            };
        }

        let mut seen = HashSet::new();
        let mut probes = Vec::new();
        let mut unknown = Vec::new();

        for name in names {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match self.entries.iter().find(|(n, _)| n == name) {
                Some((name, factory)) => probes.push((name.clone(), factory(Arc::clone(client)))),
                None => {
                    tracing::warn!("Unknown probe '{}' skipped", name);
                    unknown.push(name.clone());
                }
            }
        }

        Resolution { probes, unknown }
    }
}
