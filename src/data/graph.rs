use std::collections::HashMap;

/// Road graph as contracted from the .osm file: vertices keyed by their OSM
/// node id, each holding its own outgoing-arc list, plus the way records the
/// tags were attached to during the parse.

pub type OsmId = u64;

/// Mutation surface the graph builder drives while walking a document.
/// An undirected edge is two `add_edge` calls, one per direction.
pub trait GraphStore {
    fn add_vertex(&mut self, id: OsmId, lat: f64, lon: f64);
    fn add_way(&mut self, id: OsmId);
    fn set_way_tag(&mut self, way_id: OsmId, key: &str, value: &str);
    fn way_tag(&self, way_id: OsmId, key: &str) -> Option<&str>;
    fn set_vertex_tag(&mut self, vertex_id: OsmId, key: &str, value: &str);
    fn vertex_tags(&self, vertex_id: OsmId) -> Option<&HashMap<String, String>>;
    fn add_edge(&mut self, from: OsmId, to: OsmId);
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone)]
pub struct Vertex {
    pub id: OsmId,
    pub lat: f64,
    pub lon: f64,
    pub tags: HashMap<String, String>,
    pub adjacent: Vec<OsmId>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Clone)]
pub struct Way {
    pub id: OsmId,
    pub tags: HashMap<String, String>,
}

#[derive(rkyv::Archive, rkyv::Deserialize, rkyv::Serialize, Debug, Default, Clone)]
pub struct RoadGraph {
    pub vertices: HashMap<OsmId, Vertex>,
    pub ways: HashMap<OsmId, Way>,
}

impl RoadGraph {
    pub fn new() -> RoadGraph {
        RoadGraph::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }

    /// Number of directed arcs; twice the number of undirected edges.
    pub fn arc_count(&self) -> usize {
        self.vertices.values().map(|vertex| vertex.adjacent.len()).sum()
    }

    pub fn neighbors(&self, id: OsmId) -> &[OsmId] {
        self.vertices.get(&id)
            .map(|vertex| vertex.adjacent.as_slice())
            .unwrap_or(&[])
    }
}

impl GraphStore for RoadGraph {
    fn add_vertex(&mut self, id: OsmId, lat: f64, lon: f64) {
        self.vertices.insert(id, Vertex {
            id,
            lat,
            lon,
            tags: HashMap::new(),
            adjacent: Vec::new(),
        });
    }

    fn add_way(&mut self, id: OsmId) {
        self.ways.insert(id, Way {
            id,
            tags: HashMap::new(),
        });
    }

    fn set_way_tag(&mut self, way_id: OsmId, key: &str, value: &str) {
        if let Some(way) = self.ways.get_mut(&way_id) {
            way.tags.insert(key.to_string(), value.to_string());
        }
    }

    fn way_tag(&self, way_id: OsmId, key: &str) -> Option<&str> {
        self.ways.get(&way_id)
            .and_then(|way| way.tags.get(key))
            .map(String::as_str)
    }

    fn set_vertex_tag(&mut self, vertex_id: OsmId, key: &str, value: &str) {
        if let Some(vertex) = self.vertices.get_mut(&vertex_id) {
            vertex.tags.insert(key.to_string(), value.to_string());
        }
    }

    fn vertex_tags(&self, vertex_id: OsmId) -> Option<&HashMap<String, String>> {
        self.vertices.get(&vertex_id).map(|vertex| &vertex.tags)
    }

    // Arcs whose source vertex never appeared in the file are dropped;
    // clipped extracts reference nodes outside their bounding box.
    fn add_edge(&mut self, from: OsmId, to: OsmId) {
        if let Some(vertex) = self.vertices.get_mut(&from) {
            vertex.adjacent.push(to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_vertex_starts_without_tags_or_arcs() {
        let mut graph = RoadGraph::new();
        graph.add_vertex(7, 51.5, -0.1);

        let vertex = graph.vertices.get(&7).unwrap();
        assert_eq!(vertex.lat, 51.5);
        assert_eq!(vertex.lon, -0.1);
        assert!(vertex.tags.is_empty());
        assert!(vertex.adjacent.is_empty());
    }

    #[test]
    fn way_tags_round_trip() {
        let mut graph = RoadGraph::new();
        graph.add_way(10);
        graph.set_way_tag(10, "highway", "residential");

        assert_eq!(graph.way_tag(10, "highway"), Some("residential"));
        assert_eq!(graph.way_tag(10, "maxspeed"), None);
        assert_eq!(graph.way_tag(99, "highway"), None);
    }

    #[test]
    fn edges_accumulate_without_deduplication() {
        let mut graph = RoadGraph::new();
        graph.add_vertex(1, 0.0, 0.0);
        graph.add_vertex(2, 0.0, 1.0);
        graph.add_edge(1, 2);
        graph.add_edge(1, 2);

        assert_eq!(graph.neighbors(1), &[2, 2]);
        assert_eq!(graph.arc_count(), 2);
    }

    #[test]
    fn operations_on_unknown_ids_are_ignored() {
        let mut graph = RoadGraph::new();
        graph.set_vertex_tag(1, "name", "nowhere");
        graph.add_edge(1, 2);

        assert_eq!(graph.vertex_count(), 0);
        assert_eq!(graph.arc_count(), 0);
    }
}
