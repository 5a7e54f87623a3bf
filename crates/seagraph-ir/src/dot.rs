//! Graphviz dump for debugging.
//!
//! Nodes are labeled by opcode (constants show their pooled payload);
//! edges are colored black for value, blue for control, and dashed red for
//! effect. The graph is printed bottom-up (`rankdir = BT`) so data flows
//! toward the top of the rendering.

use std::io::{self, Write};

use crate::edge::DepKind;
use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::Node;
use crate::opcode::Opcode;

fn escape_label(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn node_label(graph: &Graph, id: NodeId, node: &Node) -> String {
    match node.op() {
        Opcode::ConstantInt => match graph.const_int_value(id) {
            Some(value) => format!("ConstantInt<{value}>"),
            None => "ConstantInt".to_string(),
        },
        Opcode::ConstantStr => match graph.const_str_value(id) {
            Some(value) => format!("ConstantStr<{}>", escape_label(value)),
            None => "ConstantStr".to_string(),
        },
        op => op.name().to_string(),
    }
}

impl Graph {
    /// Writes the whole graph in Graphviz dot format.
    pub fn dump_graphviz(&self, writer: &mut impl Write) -> io::Result<()> {
        writeln!(writer, "digraph G {{")?;
        writeln!(writer, "rankdir = BT;")?;
        for (id, node) in self.nodes() {
            writeln!(writer, "{}[label=\"{}\"];", id, node_label(self, id, node))?;
        }
        for edge in self.edges() {
            let attrs = match edge.kind {
                DepKind::Value => "color=\"black\"",
                DepKind::Control => "color=\"blue\"",
                DepKind::Effect => "color=\"red\", style=\"dashed\"",
            };
            writeln!(writer, "{}->{}[{}];", edge.source, edge.dest, attrs)?;
        }
        writeln!(writer, "}}")
    }

    /// The dot text as a string, mostly for tests and logging.
    pub fn graphviz_string(&self) -> String {
        let mut buf = Vec::new();
        self.dump_graphviz(&mut buf)
            .expect("writing to a Vec cannot fail");
        String::from_utf8(buf).expect("dot output is valid UTF-8")
    }
}
