use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::UserConfig;
use crate::builder::GraphBuilder;
use crate::data::graph::{GraphStore, RoadGraph};
use crate::errors::Result;
use crate::etl::Etl;

pub const ETL_NAME: &str = "build_graph";
pub const OUTPUT_FILE_NAME: &str = "road_graph.rkyv";

/// Feed every element boundary of the document to the builder, in document
/// order. A self-closing element counts as an open immediately followed by
/// a close.
pub fn pump_events<R: BufRead, S: GraphStore>(
    reader: &mut Reader<R>,
    builder: &mut GraphBuilder<'_, S>,
) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(e.into()),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => builder.element_open(&e)?,
            Ok(Event::End(e)) => builder.element_close(e.name().as_ref())?,
            Ok(Event::Empty(e)) => {
                builder.element_open(&e)?;
                builder.element_close(e.name().as_ref())?;
            },
            Ok(Event::Text(_e)) => return Err("Didn't expect to see Text in OSM file.".into()),
            // Declarations, comments and other markup carry no map data.
            Ok(_) => (),
        }
        // if we don't keep a borrow elsewhere, we can clear the buffer to keep memory usage low
        buf.clear();
    }
    Ok(())
}

pub struct BuildGraphEtl<'a> {
    config: &'a UserConfig,
}

impl BuildGraphEtl<'_> {
    pub fn new(config: &UserConfig) -> BuildGraphEtl {
        BuildGraphEtl {
            config
        }
    }

    fn output_path(dir: &Path) -> PathBuf {
        dir.join(OUTPUT_FILE_NAME)
    }

    fn create_osm_reader(&self) -> Result<Reader<impl BufRead>> {
        let file = File::open(Path::new(&self.config.data_path))?;
        let file_reader = BufReader::new(file);
        let xz_reader = XzDecoder::new(file_reader);
        let buffered_xz_reader = BufReader::new(xz_reader);
        let mut reader = Reader::from_reader(buffered_xz_reader);
        reader.trim_text(true);

        Ok(reader)
    }
}

impl Etl for BuildGraphEtl<'_> {
    type Input = ();
    type Output = RoadGraph;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(Self::output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        if self.is_cached(dir)? {
            fs::remove_file(Self::output_path(dir))?;
        }
        Ok(())
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        Ok(())
    }

    fn transform(&mut self, _input: ()) -> Result<Self::Output> {
        let mut reader = self.create_osm_reader()?;

        let mut graph = RoadGraph::new();
        let mut builder = GraphBuilder::new(&mut graph);
        pump_events(&mut reader, &mut builder)?;

        Ok(graph)
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        let mut output_file = File::create(Self::output_path(dir))?;
        let bytes = rkyv::to_bytes::<_, 256>(&output).unwrap();
        output_file.write_all(&bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn parse_str(doc: &str) -> Result<RoadGraph> {
        let mut reader = Reader::from_str(doc);
        reader.trim_text(true);

        let mut graph = RoadGraph::new();
        let mut builder = GraphBuilder::new(&mut graph);
        pump_events(&mut reader, &mut builder)?;

        Ok(graph)
    }

    const OAK_ST_DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="0.0" minlon="0.0" maxlat="1.0" maxlon="1.0"/>
  <node id="1" lat="0.0" lon="0.0"/>
  <node id="2" lat="0.0" lon="1.0"/>
  <way id="10">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
    <tag k="name" v="Oak St"/>
  </way>
</osm>"#;

    #[test]
    fn residential_way_document_builds_a_connected_graph() {
        let graph = parse_str(OAK_ST_DOC).unwrap();

        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.way_count(), 1);
        assert_eq!(graph.neighbors(1), &[2]);
        assert_eq!(graph.neighbors(2), &[1]);
        assert_eq!(graph.vertex_tags(1).unwrap().get("name").unwrap(), "Oak St");
        assert_eq!(graph.vertex_tags(2).unwrap().get("name").unwrap(), "Oak St");
    }

    #[test]
    fn footway_document_contributes_vertices_but_no_edges() {
        let graph = parse_str(&OAK_ST_DOC.replace("residential", "footway")).unwrap();

        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.arc_count(), 0);
        assert!(graph.vertex_tags(1).unwrap().get("name").is_none());
    }

    #[test]
    fn node_names_are_read_from_nested_tags_and_unescaped() {
        let doc = r#"<osm>
  <node id="1" lat="0.5" lon="0.5">
    <tag k="name" v="Baker &amp; May Corner"/>
  </node>
</osm>"#;
        let graph = parse_str(doc).unwrap();

        assert_eq!(
            graph.vertex_tags(1).unwrap().get("name").unwrap(),
            "Baker & May Corner",
        );
    }

    #[test]
    fn malformed_node_aborts_the_parse() {
        let doc = r#"<osm><node id="1" lon="0.0"/></osm>"#;
        let err = parse_str(doc).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MalformedInput);
    }

    #[test]
    fn process_writes_and_caches_the_graph_artifact() {
        let dir = tempfile::tempdir().unwrap();

        let input_path = dir.path().join("tiny.osm.xz");
        let mut encoder = xz::write::XzEncoder::new(File::create(&input_path).unwrap(), 6);
        encoder.write_all(OAK_ST_DOC.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let config = UserConfig {
            data_path: input_path.to_str().unwrap().to_string(),
        };
        let out_dir = dir.path().join("out");
        fs::create_dir_all(&out_dir).unwrap();

        let mut etl = BuildGraphEtl::new(&config);
        etl.process(&out_dir).unwrap();
        assert!(etl.is_cached(&out_dir).unwrap());

        let bytes = fs::read(out_dir.join(OUTPUT_FILE_NAME)).unwrap();
        let graph: RoadGraph = unsafe {
            rkyv::from_bytes_unchecked(&bytes).unwrap()
        };
        assert_eq!(graph.vertex_count(), 2);
        assert_eq!(graph.arc_count(), 2);

        // A second run must take the cached path rather than re-parsing.
        etl.process(&out_dir).unwrap();

        etl.clean(&out_dir).unwrap();
        assert!(!etl.is_cached(&out_dir).unwrap());
    }
}
