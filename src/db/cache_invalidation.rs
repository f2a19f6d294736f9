// Cache invalidation pairing system
use uuid::Uuid;

use super::cache::{glob_regex, QueryCache};

/// Cache invalidation groups - mutations that should drop a family of cached reads
#[derive(Debug, Clone)]
pub struct CacheGroup {
    pub name: String,
    /// Key patterns to drop. `{id}` is replaced by the mutation's target id,
    /// or by `*` when the mutation has none.
    pub patterns: Vec<String>,
    pub mutations: Vec<String>,
}

impl CacheGroup {
    pub fn new(name: &str, patterns: Vec<&str>, mutations: Vec<&str>) -> Self {
        Self {
            name: name.to_string(),
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            mutations: mutations.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn handles(&self, mutation: &str) -> bool {
        self.mutations
            .iter()
            .any(|m| glob_regex(m).map(|re| re.is_match(mutation)).unwrap_or(false))
    }
}

/// Cache invalidation configuration
#[derive(Debug, Clone)]
pub struct CacheInvalidationConfig {
    pub groups: Vec<CacheGroup>,
}

impl Default for CacheInvalidationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidationConfig {
    pub fn new() -> Self {
        let groups = vec![
            // TASK GROUP - every task mutation drops all lists plus the touched task
            CacheGroup::new(
                "tasks",
                vec!["tasks:*", "task:{id}"],
                vec![
                    "task.create",
                    "task.update",
                    "task.delete",
                    "task.assign",
                    "task.start",
                    "task.complete",
                    "task.cancel",
                    "task.recategorize",
                ],
            ),

            // CATEGORY GROUP - task create/delete/recategorize move the denormalized task_count
            CacheGroup::new(
                "categories",
                vec!["categories"],
                vec!["category.*", "task.create", "task.delete", "task.recategorize"],
            ),

            // WALLET GROUP - target id is the wallet owner
            CacheGroup::new(
                "wallet",
                vec!["transactions:{id}"],
                vec!["wallet.deposit", "wallet.withdraw"],
            ),
        ];

        Self { groups }
    }

    /// Every group a mutation belongs to
    pub fn find_groups_for_mutation(&self, mutation: &str) -> Vec<&CacheGroup> {
        self.groups.iter().filter(|g| g.handles(mutation)).collect()
    }

    /// Get cache patterns to invalidate for a given mutation
    pub fn get_invalidation_patterns(&self, mutation: &str, target: Option<Uuid>) -> Vec<String> {
        let id = target.map(|id| id.to_string()).unwrap_or_else(|| "*".to_string());

        let mut patterns: Vec<String> = self
            .find_groups_for_mutation(mutation)
            .into_iter()
            .flat_map(|group| group.patterns.iter().map(|p| p.replace("{id}", &id)))
            .collect();
        patterns.dedup();
        patterns
    }
}

/// Invalidate cache based on the mutation that just succeeded
pub async fn invalidate_cache_for_mutation(
    cache: &QueryCache,
    config: &CacheInvalidationConfig,
    mutation: &str,
    target: Option<Uuid>,
) {
    let patterns = config.get_invalidation_patterns(mutation, target);

    if patterns.is_empty() {
        tracing::debug!("No cache group for mutation {}", mutation);
        return;
    }

    tracing::info!("Invalidating cache for {} - patterns: {:?}", mutation, patterns);
    for pattern in patterns {
        cache.delete_pattern(&pattern).await;
    }
}
