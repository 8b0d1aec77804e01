//! Skill Graph
//!
//! Skills are grouped into themed trees. Each tree is a DAG: a node can be
//! unlocked once every prerequisite is unlocked and the character can pay
//! its cost. Ranks beyond the first cost `cost * current_level`.
//!
//! At construction the catalog is validated with petgraph (no cycles, no
//! dangling prerequisites, prerequisites strictly lower tier) and every
//! node's full prerequisite closure is precomputed, so legality checks are
//! lookups instead of tree walks.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::error::{ProgressionError, Result};
use crate::progression::Character;

/// Effect granted per rank of a skill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillEffect {
    /// Added to `stats[stat]` for every rank
    StatBoost { stat: String, amount: i64 },
    /// Passive ability, added to `active_skill_ids`
    Ability(String),
    /// Activatable power, added to `active_skill_ids`
    SpecialPower(String),
}

impl SkillEffect {
    fn granted_id(&self) -> Option<&str> {
        match self {
            Self::Ability(id) | Self::SpecialPower(id) => Some(id),
            Self::StatBoost { .. } => None,
        }
    }
}

/// A node in a skill tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: u32,
    pub cost: u32,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub max_level: u32,
    #[serde(default)]
    pub current_level: u32,
    #[serde(default)]
    pub effects: Vec<SkillEffect>,
}

impl SkillNode {
    pub fn is_unlocked(&self) -> bool {
        self.current_level >= 1
    }

    pub fn is_maxed(&self) -> bool {
        self.current_level >= self.max_level
    }

    /// Cost of the next rank (only meaningful once unlocked)
    pub fn upgrade_cost(&self) -> u32 {
        self.cost.saturating_mul(self.current_level)
    }
}

/// A themed tree of skill nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTree {
    pub id: String,
    pub name: String,
    pub nodes: Vec<SkillNode>,
    #[serde(default)]
    pub unlocked_count: usize,
}

impl SkillTree {
    fn recount(&mut self) {
        self.unlocked_count = self.nodes.iter().filter(|n| n.is_unlocked()).count();
    }
}

/// Persisted rank of every node in one tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillTreeProgress {
    pub tree_id: String,
    pub levels: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodeRef {
    tree: usize,
    node: usize,
}

/// All skill trees plus the id index and precomputed prerequisite closures
#[derive(Debug, Clone)]
pub struct SkillGraph {
    trees: Vec<SkillTree>,
    index: HashMap<String, NodeRef>,
    closure: HashMap<String, Vec<NodeRef>>,
    /// Node refs in dependency order (prerequisites first)
    topo_order: Vec<NodeRef>,
}

impl SkillGraph {
    /// Validate the catalog trees and build the index
    pub fn new(mut trees: Vec<SkillTree>) -> Result<Self> {
        let mut index = HashMap::new();
        let mut tree_ids = HashSet::new();
        let mut graph: DiGraph<NodeRef, ()> = DiGraph::new();
        let mut graph_ids: HashMap<String, NodeIndex> = HashMap::new();

        for (t, tree) in trees.iter().enumerate() {
            if !tree_ids.insert(tree.id.clone()) {
                return Err(invalid(format!("duplicate skill tree id '{}'", tree.id)));
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                if node.tier == 0 {
                    return Err(invalid(format!("skill '{}' has tier 0", node.id)));
                }
                if node.cost == 0 {
                    return Err(invalid(format!("skill '{}' has zero cost", node.id)));
                }
                if node.max_level == 0 {
                    return Err(invalid(format!("skill '{}' has max_level 0", node.id)));
                }
                if node.current_level > node.max_level {
                    return Err(invalid(format!(
                        "skill '{}' level {} exceeds max {}",
                        node.id, node.current_level, node.max_level
                    )));
                }
                let node_ref = NodeRef { tree: t, node: n };
                if index.insert(node.id.clone(), node_ref).is_some() {
                    return Err(invalid(format!("duplicate skill id '{}'", node.id)));
                }
                graph_ids.insert(node.id.clone(), graph.add_node(node_ref));
            }
        }

        for tree in &trees {
            for node in &tree.nodes {
                for prereq in &node.prerequisites {
                    let same_tree = tree.nodes.iter().any(|n| &n.id == prereq);
                    if !same_tree {
                        return Err(invalid(format!(
                            "skill '{}' requires '{}', which is not in tree '{}'",
                            node.id, prereq, tree.id
                        )));
                    }
                    graph.add_edge(graph_ids[prereq], graph_ids[&node.id], ());
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            let at = graph[cycle.node_id()];
            invalid(format!(
                "dependency cycle through skill '{}'",
                trees[at.tree].nodes[at.node].id
            ))
        })?;
        let topo_order: Vec<NodeRef> = order.iter().map(|idx| graph[*idx]).collect();

        let mut closure = HashMap::new();
        let reversed = Reversed(&graph);
        for tree in &trees {
            for node in &tree.nodes {
                for prereq in &node.prerequisites {
                    let p = index[prereq];
                    if trees[p.tree].nodes[p.node].tier >= node.tier {
                        return Err(invalid(format!(
                            "skill '{}' (tier {}) requires '{}' of an equal or higher tier",
                            node.id, node.tier, prereq
                        )));
                    }
                }
                let start = graph_ids[&node.id];
                let mut dfs = Dfs::new(reversed, start);
                let mut ancestors = Vec::new();
                while let Some(idx) = dfs.next(reversed) {
                    if idx != start {
                        ancestors.push(graph[idx]);
                    }
                }
                closure.insert(node.id.clone(), ancestors);
            }
        }

        for tree in &mut trees {
            tree.recount();
        }

        let skill_graph = Self {
            trees,
            index,
            closure,
            topo_order,
        };
        if !skill_graph.check_invariants() {
            return Err(invalid(
                "catalog ships a skill unlocked without its prerequisites".into(),
            ));
        }
        Ok(skill_graph)
    }

    pub fn trees(&self) -> &[SkillTree] {
        &self.trees
    }

    pub fn tree(&self, tree_id: &str) -> Option<&SkillTree> {
        self.trees.iter().find(|t| t.id == tree_id)
    }

    pub fn get(&self, skill_id: &str) -> Option<&SkillNode> {
        self.index
            .get(skill_id)
            .map(|r| &self.trees[r.tree].nodes[r.node])
    }

    pub fn contains(&self, skill_id: &str) -> bool {
        self.index.contains_key(skill_id)
    }

    /// Every transitive prerequisite of a skill
    pub fn prerequisite_closure(&self, skill_id: &str) -> Result<Vec<&str>> {
        let refs = self
            .closure
            .get(skill_id)
            .ok_or_else(|| ProgressionError::UnknownSkill(skill_id.to_string()))?;
        Ok(refs
            .iter()
            .map(|r| self.trees[r.tree].nodes[r.node].id.as_str())
            .collect())
    }

    fn lookup(&self, skill_id: &str) -> Result<NodeRef> {
        self.index
            .get(skill_id)
            .copied()
            .ok_or_else(|| ProgressionError::UnknownSkill(skill_id.to_string()))
    }

    fn node(&self, r: NodeRef) -> &SkillNode {
        &self.trees[r.tree].nodes[r.node]
    }

    fn prerequisites_met(&self, skill_id: &str) -> bool {
        self.closure
            .get(skill_id)
            .map(|refs| refs.iter().all(|r| self.node(*r).is_unlocked()))
            .unwrap_or(false)
    }

    /// Whether `unlock` would succeed right now
    pub fn can_unlock(&self, skill_id: &str, character: &Character) -> Result<bool> {
        let node = self.node(self.lookup(skill_id)?);
        Ok(!node.is_unlocked()
            && self.prerequisites_met(skill_id)
            && character.skill_points >= node.cost)
    }

    /// Skills the character could unlock right now
    pub fn available(&self, character: &Character) -> Vec<&SkillNode> {
        self.topo_order
            .iter()
            .map(|r| self.node(*r))
            .filter(|n| {
                !n.is_unlocked()
                    && self.prerequisites_met(&n.id)
                    && character.skill_points >= n.cost
            })
            .collect()
    }

    /// Unlock a skill at rank 1. Returns `Ok(false)` without touching any
    /// state when it is already unlocked, a prerequisite is missing, or the
    /// character cannot pay.
    pub fn unlock(&mut self, skill_id: &str, character: &mut Character) -> Result<bool> {
        let r = self.lookup(skill_id)?;
        let node = self.node(r);
        if node.is_unlocked() {
            debug!(skill = skill_id, "unlock rejected: already unlocked");
            return Ok(false);
        }
        if !self.prerequisites_met(skill_id) {
            debug!(skill = skill_id, "unlock rejected: missing prerequisite");
            return Ok(false);
        }
        if character.skill_points < node.cost {
            debug!(
                skill = skill_id,
                cost = node.cost,
                points = character.skill_points,
                "unlock rejected: insufficient skill points"
            );
            return Ok(false);
        }

        character.skill_points -= node.cost;
        let tree = &mut self.trees[r.tree];
        let node = &mut tree.nodes[r.node];
        node.current_level = 1;
        apply_effects(&node.effects, character, 1);
        character.unlocked_skill_ids.insert(node.id.clone());
        tree.unlocked_count += 1;
        info!(skill = skill_id, tree = %tree.id, "skill unlocked");

        debug_assert!(self.check_invariants());
        Ok(true)
    }

    /// Raise an unlocked skill by one rank, paying `cost * current_level`.
    /// Only the new rank's effects are applied.
    pub fn upgrade(&mut self, skill_id: &str, character: &mut Character) -> Result<bool> {
        let r = self.lookup(skill_id)?;
        let node = self.node(r);
        if !node.is_unlocked() {
            debug!(skill = skill_id, "upgrade rejected: not unlocked");
            return Ok(false);
        }
        if node.is_maxed() {
            debug!(skill = skill_id, "upgrade rejected: already at max level");
            return Ok(false);
        }
        let price = node.upgrade_cost();
        if character.skill_points < price {
            debug!(
                skill = skill_id,
                cost = price,
                points = character.skill_points,
                "upgrade rejected: insufficient skill points"
            );
            return Ok(false);
        }

        character.skill_points -= price;
        let node = &mut self.trees[r.tree].nodes[r.node];
        node.current_level += 1;
        apply_effects(&node.effects, character, 1);
        info!(skill = skill_id, level = node.current_level, "skill upgraded");

        debug_assert!(self.check_invariants());
        Ok(true)
    }

    /// Current rank of a skill
    pub fn level(&self, skill_id: &str) -> Result<u32> {
        Ok(self.node(self.lookup(skill_id)?).current_level)
    }

    /// Relock every node above tier 1, reverting its stat effects and
    /// dropping abilities no remaining node grants. Returns the relocked ids.
    pub fn relock_above_tier_one(&mut self, character: &mut Character) -> Vec<String> {
        let mut relocked = Vec::new();
        for tree in &mut self.trees {
            for node in &mut tree.nodes {
                if node.tier > 1 && node.is_unlocked() {
                    revert_stat_effects(&node.effects, character, node.current_level);
                    node.current_level = 0;
                    character.unlocked_skill_ids.remove(&node.id);
                    relocked.push(node.id.clone());
                }
            }
            tree.recount();
        }
        self.rebuild_active_abilities(character);
        debug_assert!(self.check_invariants());
        relocked
    }

    /// `active_skill_ids` becomes exactly the abilities and powers granted by
    /// unlocked nodes
    pub fn rebuild_active_abilities(&self, character: &mut Character) {
        character.active_skill_ids = self
            .trees
            .iter()
            .flat_map(|t| t.nodes.iter())
            .filter(|n| n.is_unlocked())
            .flat_map(|n| n.effects.iter().filter_map(SkillEffect::granted_id))
            .map(str::to_string)
            .collect();
    }

    /// Snapshot of every node's rank
    pub fn progress(&self) -> Vec<SkillTreeProgress> {
        self.trees
            .iter()
            .map(|tree| SkillTreeProgress {
                tree_id: tree.id.clone(),
                levels: tree
                    .nodes
                    .iter()
                    .filter(|n| n.is_unlocked())
                    .map(|n| (n.id.clone(), n.current_level))
                    .collect(),
            })
            .collect()
    }

    /// Restore ranks from a snapshot. Unknown ids are skipped, ranks are
    /// clamped to `max_level`, and any node whose prerequisites did not
    /// survive the restore is relocked. Stat boosts for ranks dropped by the
    /// clamp or the relock are reverted; the snapshot's stats otherwise stand.
    /// The character's unlocked and active sets are rebuilt from the graph.
    pub fn restore(&mut self, progress: &[SkillTreeProgress], character: &mut Character) {
        for tree in &mut self.trees {
            for node in &mut tree.nodes {
                node.current_level = 0;
            }
        }
        for tree_progress in progress {
            for (skill_id, level) in &tree_progress.levels {
                match self.index.get(skill_id) {
                    Some(r) => {
                        let node = &mut self.trees[r.tree].nodes[r.node];
                        node.current_level = (*level).min(node.max_level);
                        if *level > node.max_level {
                            warn!(skill = %skill_id, level, max = node.max_level, "clamping restored skill rank");
                            revert_stat_effects(&node.effects, character, *level - node.max_level);
                        }
                    }
                    None => warn!(skill = %skill_id, "ignoring unknown skill in snapshot"),
                }
            }
        }
        for i in 0..self.topo_order.len() {
            let r = self.topo_order[i];
            let id = self.node(r).id.clone();
            if self.node(r).is_unlocked() && !self.prerequisites_met(&id) {
                warn!(skill = %id, "relocking restored skill with missing prerequisites");
                let node = &mut self.trees[r.tree].nodes[r.node];
                revert_stat_effects(&node.effects, character, node.current_level);
                node.current_level = 0;
            }
        }
        for tree in &mut self.trees {
            tree.recount();
        }
        character.unlocked_skill_ids = self
            .trees
            .iter()
            .flat_map(|t| t.nodes.iter())
            .filter(|n| n.is_unlocked())
            .map(|n| n.id.clone())
            .collect();
        self.rebuild_active_abilities(character);
        debug_assert!(self.check_invariants());
    }

    /// `unlocked_count` matches the nodes, and no unlocked node has a locked
    /// prerequisite
    pub fn check_invariants(&self) -> bool {
        self.trees.iter().all(|tree| {
            tree.unlocked_count == tree.nodes.iter().filter(|n| n.is_unlocked()).count()
                && tree
                    .nodes
                    .iter()
                    .filter(|n| n.is_unlocked())
                    .all(|n| n.current_level <= n.max_level && self.prerequisites_met(&n.id))
        })
    }
}

fn invalid(detail: String) -> ProgressionError {
    ProgressionError::InvalidCatalog(detail)
}

fn apply_effects(effects: &[SkillEffect], character: &mut Character, ranks: u32) {
    for effect in effects {
        match effect {
            SkillEffect::StatBoost { stat, amount } => {
                *character.stats.entry(stat.clone()).or_insert(0) += amount * ranks as i64;
            }
            SkillEffect::Ability(id) | SkillEffect::SpecialPower(id) => {
                character.active_skill_ids.insert(id.clone());
            }
        }
    }
}

fn revert_stat_effects(effects: &[SkillEffect], character: &mut Character, ranks: u32) {
    for effect in effects {
        if let SkillEffect::StatBoost { stat, amount } = effect {
            *character.stats.entry(stat.clone()).or_insert(0) -= amount * ranks as i64;
        }
    }
}
