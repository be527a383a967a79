use std::collections::VecDeque;
use std::str;

use quick_xml::events::BytesStart;

use crate::data::graph::{GraphStore, OsmId};
use crate::errors::{Error, Result};

/// Road classes that contribute connectivity. Ways tagged outside this set
/// (footpaths, buildings, service roads) still have their nodes recorded as
/// vertices but produce no edges.
const ALLOWED_HIGHWAY_TYPES: [&str; 13] = [
    "motorway", "trunk", "primary", "secondary", "tertiary", "unclassified",
    "residential", "living_street", "motorway_link", "trunk_link",
    "primary_link", "secondary_link", "tertiary_link",
];

enum ParserState {
    Idle,
    Node,
    Way,
}

/// Streaming visitor over element open/close events of an OSM document.
///
/// Populates a [`GraphStore`] in a single forward pass: vertices as nodes
/// arrive, tags as they arrive, and edges when a way closes and its node
/// references are contracted into consecutive pairs. The builder holds no
/// reference to the document, only the state needed to place the next event:
/// which entity is open, the open way's id, its pending node references, and
/// the most recently opened node.
pub struct GraphBuilder<'a, S: GraphStore> {
    graph: &'a mut S,
    state: ParserState,
    active_way: Option<OsmId>,
    pending_refs: VecDeque<OsmId>,
    last_node: Option<OsmId>,
}

impl<'a, S: GraphStore> GraphBuilder<'a, S> {
    pub fn new(graph: &'a mut S) -> GraphBuilder<'a, S> {
        GraphBuilder {
            graph,
            state: ParserState::Idle,
            active_way: None,
            pending_refs: VecDeque::new(),
            last_node: None,
        }
    }

    /// Dispatch an element-open event. Self-closing elements must be fed
    /// here first and then to [`GraphBuilder::element_close`].
    pub fn element_open(&mut self, el: &BytesStart) -> Result<()> {
        match el.name().as_ref() {
            b"node" => {
                let (id, lat, lon) = Self::parse_node_attributes(el)?;
                self.graph.add_vertex(id, lat, lon);
                self.state = ParserState::Node;
                self.last_node = Some(id);
            },
            b"way" => {
                let id = Self::parse_way_attributes(el)?;
                self.graph.add_way(id);
                self.state = ParserState::Way;
                self.active_way = Some(id);
            },
            b"nd" => {
                // A node reference outside a way is malformed nesting; it
                // must not corrupt the pending queue.
                if let ParserState::Way = self.state {
                    self.pending_refs.push_back(Self::parse_ref_attribute(el)?);
                }
            },
            b"tag" => self.handle_tag(el)?,
            _ => (),
        }
        Ok(())
    }

    /// Dispatch an element-close event. Closing a way contracts its pending
    /// node references into edges; closing a node or way returns the state
    /// machine to idle so a stray tag between entities is ignored.
    pub fn element_close(&mut self, name: &[u8]) -> Result<()> {
        match name {
            b"way" => {
                self.finish_way()?;
                self.state = ParserState::Idle;
                self.active_way = None;
            },
            b"node" => self.state = ParserState::Idle,
            _ => (),
        }
        Ok(())
    }

    fn handle_tag(&mut self, el: &BytesStart) -> Result<()> {
        let Some((key, value)) = Self::parse_tag_attributes(el)? else {
            return Ok(());
        };

        match self.state {
            ParserState::Way => {
                if let Some(way_id) = self.active_way {
                    match key.as_str() {
                        "highway" | "maxspeed" | "name" => {
                            self.graph.set_way_tag(way_id, &key, &value);
                        },
                        _ => (),
                    }
                }
            },
            ParserState::Node => {
                if key == "name" {
                    let node_id = self.last_node.ok_or_else(|| Error::structural_invariant(
                        "name tag arrived before any node was opened",
                    ))?;
                    self.graph.set_vertex_tag(node_id, "name", &value);
                }
            },
            ParserState::Idle => (),
        }
        Ok(())
    }

    /// Filter and contract the way that just closed. Ways without an allowed
    /// highway class are discarded; the pending queue is cleared either way,
    /// explicitly on the discard path and by draining on the routable path.
    fn finish_way(&mut self) -> Result<()> {
        let way_id = match self.active_way {
            Some(id) => id,
            None => {
                self.pending_refs.clear();
                return Ok(());
            },
        };

        let allowed = self.graph.way_tag(way_id, "highway")
            .map(|class| ALLOWED_HIGHWAY_TYPES.contains(&class))
            .unwrap_or(false);
        if !allowed {
            self.pending_refs.clear();
            return Ok(());
        }

        let mut current = match self.pending_refs.pop_front() {
            Some(first) => first,
            None => {
                return Err(Error::structural_invariant(format!(
                    "routable way {} closed with no node references", way_id,
                )));
            },
        };

        let way_name = self.graph.way_tag(way_id, "name").map(|name| name.to_string());

        while let Some(next) = self.pending_refs.pop_front() {
            if let Some(name) = way_name.as_deref() {
                self.name_vertex_if_unnamed(current, name);
            }
            self.graph.add_edge(current, next);
            self.graph.add_edge(next, current);
            current = next;
        }
        // The last node of the walk inherits the road name too.
        if let Some(name) = way_name.as_deref() {
            self.name_vertex_if_unnamed(current, name);
        }

        Ok(())
    }

    fn name_vertex_if_unnamed(&mut self, vertex_id: OsmId, name: &str) {
        let already_named = self.graph.vertex_tags(vertex_id)
            .map(|tags| tags.contains_key("name"))
            .unwrap_or(false);
        if !already_named {
            self.graph.set_vertex_tag(vertex_id, "name", name);
        }
    }

    fn parse_node_attributes(el: &BytesStart) -> Result<(OsmId, f64, f64)> {
        let mut id: Option<OsmId> = None;
        let mut lat: Option<f64> = None;
        let mut lon: Option<f64> = None;

        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            match attribute.key.as_ref() {
                b"id" => id = Some(str::from_utf8(&attribute.value)?.parse()?),
                b"lat" => lat = Some(str::from_utf8(&attribute.value)?.parse()?),
                b"lon" => lon = Some(str::from_utf8(&attribute.value)?.parse()?),
                _ => (),
            }
        }

        match (id, lat, lon) {
            (Some(id), Some(lat), Some(lon)) => Ok((id, lat, lon)),
            _ => Err(Error::malformed_input("node element is missing id, lat or lon")),
        }
    }

    fn parse_way_attributes(el: &BytesStart) -> Result<OsmId> {
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            if attribute.key.as_ref() == b"id" {
                return Ok(str::from_utf8(&attribute.value)?.parse()?);
            }
        }
        Err(Error::malformed_input("way element is missing id"))
    }

    fn parse_ref_attribute(el: &BytesStart) -> Result<OsmId> {
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            if attribute.key.as_ref() == b"ref" {
                return Ok(str::from_utf8(&attribute.value)?.parse()?);
            }
        }
        Err(Error::malformed_input("nd element is missing ref"))
    }

    fn parse_tag_attributes(el: &BytesStart) -> Result<Option<(String, String)>> {
        let mut key: Option<String> = None;
        let mut value: Option<String> = None;

        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            match attribute.key.as_ref() {
                b"k" => key = Some(attribute.unescape_value()?.into_owned()),
                b"v" => value = Some(attribute.unescape_value()?.into_owned()),
                _ => (),
            }
        }

        Ok(key.zip(value))
    }
}
