//! Robots.txt rules for one site
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay
//! is not part of that crate's matcher, so groups are scanned here.

use robotstxt::DefaultMatcher;

/// Robots.txt content of one site
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    /// Set when no robots.txt was served; every URL is allowed
    allow_all: bool,
}

/// One `User-agent` group and the crawl delay it declares
#[derive(Debug, Default)]
struct AgentGroup {
    agents: Vec<String>,
    crawl_delay: Option<f64>,
}

impl AgentGroup {
    fn is_wildcard(&self) -> bool {
        self.agents.iter().any(|a| a == "*")
    }

    fn names(&self, token: &str) -> bool {
        self.agents.iter().any(|a| a != "*" && token.contains(a.as_str()))
    }
}

impl ParsedRobots {
    /// Wraps the body of a served robots.txt
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Rules for a site that serves no robots.txt
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to check, absolute or path-only (e.g., "/isi")
    /// * `user_agent` - The product token to match (e.g., "TapMap")
    ///
    /// # Returns
    ///
    /// * `true` - If the URL is allowed
    /// * `false` - If the URL is disallowed
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Crawl-delay in seconds declared for `user_agent`
    ///
    /// A group naming the agent wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.allow_all {
            return None;
        }

        let token = user_agent.to_lowercase();
        let groups = agent_groups(&self.content);

        groups
            .iter()
            .filter(|g| g.names(&token))
            .find_map(|g| g.crawl_delay)
            .or_else(|| {
                groups
                    .iter()
                    .filter(|g| g.is_wildcard())
                    .find_map(|g| g.crawl_delay)
            })
    }
}

/// Splits robots.txt into groups; consecutive `User-agent` lines share one
fn agent_groups(content: &str) -> Vec<AgentGroup> {
    let mut groups: Vec<AgentGroup> = Vec::new();
    let mut in_agent_lines = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_lowercase().as_str() {
            "user-agent" => {
                if !in_agent_lines {
                    groups.push(AgentGroup::default());
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(value.to_lowercase());
                }
                in_agent_lines = true;
            }
            "crawl-delay" => {
                if let (Some(group), Ok(delay)) = (groups.last_mut(), value.parse::<f64>()) {
                    group.crawl_delay.get_or_insert(delay);
                }
                in_agent_lines = false;
            }
            _ => in_agent_lines = false,
        }
    }

    groups
}

/// Extracts the product token robots.txt groups are matched against
///
/// `"TapMap/1.0 (internal pharma audit tool)"` becomes `"TapMap"`.
pub fn product_token(user_agent: &str) -> &str {
    let token = user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or("");
    if token.is_empty() {
        "*"
    } else {
        token
    }
}
