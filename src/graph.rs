//! Conversion graph: adjacency over model bridge edges, breadth-first
//! shortest paths, and path execution.
//!
//! The adjacency table and the resolved paths are memoized; every registry
//! mutation clears both through [`invalidate`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::error::{Error, Result};
use crate::math::Vec3;
use crate::registry;

type Adjacency = HashMap<String, Vec<String>>;

static GRAPH: Lazy<RwLock<Option<Arc<Adjacency>>>> = Lazy::new(|| RwLock::new(None));
static PATHS: Lazy<RwLock<HashMap<String, Arc<Vec<String>>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Drop the memoized adjacency and paths. Called on every registry
/// mutation.
pub(crate) fn invalidate() {
    *GRAPH.write().unwrap_or_else(|e| e.into_inner()) = None;
    PATHS.write().unwrap_or_else(|e| e.into_inner()).clear();
}

/// The undirected adjacency over `{model, model.bridge}` edges, built
/// lazily on first use.
fn adjacency() -> Arc<Adjacency> {
    if let Some(graph) = GRAPH.read().unwrap_or_else(|e| e.into_inner()).as_ref() {
        return graph.clone();
    }

    let mut adjacency: Adjacency = HashMap::new();
    for (model, bridge) in registry::model_edges() {
        let forward = adjacency.entry(model.clone()).or_default();
        if !forward.contains(&bridge) {
            forward.push(bridge.clone());
        }
        let backward = adjacency.entry(bridge).or_default();
        if !backward.contains(&model) {
            backward.push(model);
        }
    }

    let graph = Arc::new(adjacency);
    *GRAPH.write().unwrap_or_else(|e| e.into_inner()) = Some(graph.clone());
    graph
}

/// Shortest node path between two registered models, memoized per
/// `"from-to"` pair.
pub(crate) fn path(from: &str, to: &str) -> Result<Arc<Vec<String>>> {
    // Both endpoints must be registered models.
    registry::model(from)?;
    registry::model(to)?;

    if from == to {
        return Ok(Arc::new(vec![from.to_string()]));
    }

    let cache_key = format!("{}-{}", from, to);
    if let Some(path) = PATHS
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .get(&cache_key)
    {
        return Ok(path.clone());
    }

    let graph = adjacency();

    let mut parents: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(from);
    parents.insert(from, from);

    while let Some(node) = queue.pop_front() {
        if node == to {
            break;
        }
        if let Some(neighbors) = graph.get(node) {
            for neighbor in neighbors {
                if !parents.contains_key(neighbor.as_str()) {
                    parents.insert(neighbor.as_str(), node);
                    queue.push_back(neighbor.as_str());
                }
            }
        }
    }

    if !parents.contains_key(to) {
        return Err(Error::NoPath {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    let mut nodes = vec![to.to_string()];
    let mut cursor = to;
    while cursor != from {
        cursor = parents[cursor];
        nodes.push(cursor.to_string());
    }
    nodes.reverse();

    let path = Arc::new(nodes);
    PATHS
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .insert(cache_key, path.clone());
    Ok(path)
}

/// Convert the first three coordinates along the shortest path; alpha is
/// carried through by the caller unchanged.
pub(crate) fn convert(from: &str, to: &str, coords: Vec3) -> Result<Vec3> {
    if from == to {
        return Ok(coords);
    }

    let nodes = path(from, to)?;
    let mut current = coords;
    for pair in nodes.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let model_a = registry::model(a)?;
        let model_b = registry::model(b)?;
        if model_a.bridge == *b {
            current = (model_a.to_bridge)(current);
        } else if model_b.bridge == *a {
            current = (model_b.from_bridge)(current);
        } else {
            return Err(Error::Validation(format!(
                "models '{}' and '{}' are adjacent in the path but share no converter",
                a, b
            )));
        }
    }
    Ok(current)
}
