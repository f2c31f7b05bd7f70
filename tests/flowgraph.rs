//! Block management, connections and validation of whole flow graphs.
mod common;
use common::*;
use flowgraph::prelude::*;

fn count<F: Fn(&ValidationError) -> bool>(diagnostics: &[Diagnostic], predicate: F) -> usize {
    diagnostics.iter().filter(|d| predicate(&d.error)).count()
}

#[test]
fn test_block_ids_use_smallest_free_suffix() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let blocks: Vec<ElementId> = (0..3)
        .map(|_| graph.add_block_from(&platform, "null_sink").unwrap())
        .collect();
    let ids: Vec<&str> = blocks.iter().map(|b| graph.block(*b).unwrap().id()).collect();
    assert_eq!(ids, vec!["null_sink_0", "null_sink_1", "null_sink_2"]);

    graph.remove(&[blocks[1]]).unwrap();
    let again = graph.add_block_from(&platform, "null_sink").unwrap();
    assert_eq!(graph.block(again).unwrap().id(), "null_sink_1");
    assert_eq!(graph.next_block_id("null_sink"), "null_sink_3");
}

#[test]
fn test_duplicate_ids_reported_once_per_block() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let first = graph.add_block_from(&platform, "null_sink").unwrap();
    let second = graph.add_block_from(&platform, "null_sink").unwrap();
    let third = graph.add_block_from(&platform, "null_sink").unwrap();
    graph.set_param(second, "id", "null_sink_0").unwrap();
    rewrite(&mut graph);

    let diagnostics = diagnostics(&graph);
    let duplicates: Vec<&Diagnostic> = diagnostics
        .iter()
        .filter(|d| matches!(d.error, ValidationError::DuplicateId { .. }))
        .collect();
    assert_eq!(duplicates.len(), 2);
    assert!(duplicates.iter().any(|d| d.element == first));
    assert!(duplicates.iter().any(|d| d.element == second));
    assert!(!duplicates.iter().any(|d| d.element == third));
}

#[test]
fn test_invalid_and_reserved_ids() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let a = graph.add_block_from(&platform, "null_sink").unwrap();
    let b = graph.add_block_from(&platform, "null_sink").unwrap();
    graph.set_param(a, "id", "9lives").unwrap();
    graph.set_param(b, "id", "math").unwrap();
    rewrite(&mut graph);

    let diagnostics = diagnostics(&graph);
    assert_eq!(
        count(&diagnostics, |e| matches!(e, ValidationError::InvalidIdentifier { .. })),
        1
    );
    assert_eq!(
        count(&diagnostics, |e| matches!(e, ValidationError::ReservedIdentifier { .. })),
        1
    );
}

#[test]
fn test_sink_to_sink_is_rejected() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let a = graph.add_block_from(&platform, "null_sink").unwrap();
    let b = graph.add_block_from(&platform, "null_sink").unwrap();
    rewrite(&mut graph);

    let result = graph.make_connection(Endpoint::sink(a, "in"), Endpoint::sink(b, "in"));
    assert!(matches!(
        result,
        Err(ConnectionError::DirectionMismatch { .. })
    ));
    assert!(graph.connections().is_empty());
    assert_eq!(graph.state(), GraphState::Rewritten);
}

#[test]
fn test_incompatible_stream_types_are_rejected() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let source = graph.add_block_from(&platform, "signal_source").unwrap();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();
    graph.set_param(source, "type", "float").unwrap();
    rewrite(&mut graph);

    let result = graph.make_connection(Endpoint::source(source, "out"), Endpoint::sink(sink, "in"));
    assert!(matches!(
        result,
        Err(ConnectionError::IncompatibleTypes { ref output_type, ref input_type })
            if output_type == "float" && input_type == "complex"
    ));
    assert!(graph.connections().is_empty());
}

#[test]
fn test_connection_endpoint_errors() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let source = graph.add_block_from(&platform, "signal_source").unwrap();
    let strobe = graph.add_block_from(&platform, "message_strobe").unwrap();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();
    rewrite(&mut graph);

    assert!(matches!(
        graph.make_connection(Endpoint::source(source, "nope"), Endpoint::sink(sink, "in")),
        Err(ConnectionError::UnknownPort { .. })
    ));
    assert!(matches!(
        graph.make_connection(Endpoint::source(strobe, "strobe"), Endpoint::sink(sink, "in")),
        Err(ConnectionError::KindMismatch { .. })
    ));

    // Endpoint order does not matter.
    graph
        .make_connection(Endpoint::sink(sink, "in"), Endpoint::source(source, "out"))
        .unwrap();
    assert!(matches!(
        graph.make_connection(Endpoint::source(source, "out"), Endpoint::sink(sink, "in")),
        Err(ConnectionError::Duplicate { .. })
    ));
    assert_eq!(graph.connections().len(), 1);
    assert_eq!(graph.connections()[0].source, Endpoint::source(source, "out"));
}

#[test]
fn test_unrewritten_block_has_no_ports() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let source = graph.add_block_from(&platform, "signal_source").unwrap();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();

    assert!(matches!(
        graph.make_connection(Endpoint::source(source, "out"), Endpoint::sink(sink, "in")),
        Err(ConnectionError::UnknownPort { .. })
    ));
}

#[test]
fn test_removing_block_removes_its_connections() {
    let platform = create_platform();
    let (mut graph, [source, throttle, sink]) = create_simple_chain(&platform);
    let before = graph.tree().len();

    graph.remove(&[throttle]).unwrap();

    assert!(graph.connections().is_empty());
    assert!(graph.block(throttle).is_none());
    assert!(!graph.tree().contains(throttle));
    assert!(graph.block(source).is_some() && graph.block(sink).is_some());
    assert!(graph.tree().len() < before - 2);
    assert_eq!(graph.state(), GraphState::Dirty);
}

#[test]
fn test_remove_rejects_owned_elements() {
    let platform = create_platform();
    let (mut graph, [source, _, _]) = create_simple_chain(&platform);
    let param = graph.block(source).unwrap().param("freq").unwrap().element;

    assert!(matches!(
        graph.remove(&[param]),
        Err(GraphError::NotRemovable { .. })
    ));
    assert!(matches!(
        graph.remove(&[graph.root()]),
        Err(GraphError::NotRemovable { .. })
    ));

    // A rejected batch removes nothing.
    let connection = graph.connections()[0].element;
    assert!(graph.remove(&[connection, param]).is_err());
    assert_eq!(graph.connections().len(), 2);

    graph.remove(&[connection]).unwrap();
    assert_eq!(graph.connections().len(), 1);
    assert!(matches!(
        graph.remove(&[connection]),
        Err(GraphError::UnknownElement(_))
    ));
}

#[test]
fn test_complete_graph_becomes_valid() {
    let platform = create_platform();
    let (mut graph, _) = create_simple_chain(&platform);
    assert_eq!(graph.state(), GraphState::Dirty);

    graph.ensure_valid().unwrap();
    assert_eq!(graph.state(), GraphState::Valid);
    assert_eq!(graph.validate().count(), 0);

    graph.set_variable("samp_rate", "48000").unwrap();
    assert_eq!(graph.state(), GraphState::Dirty);
}

#[test]
fn test_validate_never_rewrites() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();

    let diagnostics = diagnostics(&graph);
    assert!(matches!(diagnostics[0].error, ValidationError::NotRewritten));
    assert_eq!(graph.state(), GraphState::Dirty);
    assert!(graph.param_value(sink, "type").is_none());

    // The sequence restarts on every call.
    assert_eq!(graph.validate().count(), diagnostics.len());
}

#[test]
fn test_ensure_valid_reports_issues() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    graph.add_block_from(&platform, "null_sink").unwrap();

    match graph.ensure_valid() {
        Err(GraphError::Invalid { count, report }) => {
            assert_eq!(count, 1);
            assert!(report.contains("null_sink_0:in"));
            assert!(report.contains("not connected"));
        }
        other => panic!("expected an invalid graph, got {:?}", other),
    }
    assert_eq!(graph.state(), GraphState::Rewritten);
}

#[test]
fn test_unconnected_required_ports() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    graph.add_block_from(&platform, "tagged_sink").unwrap();
    graph.add_block_from(&platform, "message_debug").unwrap();
    rewrite(&mut graph);

    let diagnostics = diagnostics(&graph);
    let unconnected: Vec<&str> = diagnostics
        .iter()
        .filter_map(|d| match &d.error {
            ValidationError::PortNotConnected { port, .. } => Some(port.as_str()),
            _ => None,
        })
        .collect();
    // `cmd` and `store` are optional.
    assert_eq!(unconnected, vec!["in", "print"]);
}

#[test]
fn test_disabled_blocks_skip_connectivity_checks() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();
    graph.set_block_enabled(sink, false).unwrap();
    rewrite(&mut graph);

    assert!(!graph.block(sink).unwrap().enabled());
    assert_eq!(graph.validate().count(), 0);
}

#[test]
fn test_stream_sink_accepts_one_connection() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let a = graph.add_block_from(&platform, "signal_source").unwrap();
    let b = graph.add_block_from(&platform, "signal_source").unwrap();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();
    rewrite(&mut graph);
    connect(&mut graph, a, "out", sink, "in");
    connect(&mut graph, b, "out", sink, "in");
    rewrite(&mut graph);

    let diagnostics = diagnostics(&graph);
    assert!(diagnostics.iter().any(|d| matches!(
        d.error,
        ValidationError::TooManyConnections { count: 2, .. }
    )));

    // Connections from a disabled block do not count.
    graph.set_block_enabled(b, false).unwrap();
    rewrite(&mut graph);
    assert_eq!(graph.validate().count(), 0);
}

#[test]
fn test_item_size_mismatch() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let source = graph.add_block_from(&platform, "signal_source").unwrap();
    let sink = graph.add_block_from(&platform, "vector_sink").unwrap();
    graph.set_param(source, "type", "float").unwrap();
    graph.set_param(sink, "type", "float").unwrap();
    rewrite(&mut graph);
    connect(&mut graph, source, "out", sink, "in");

    graph.set_param(sink, "vlen", "2").unwrap();
    rewrite(&mut graph);

    let diagnostics = diagnostics(&graph);
    assert!(diagnostics.iter().any(|d| matches!(
        d.error,
        ValidationError::ItemSizeMismatch { source_size: 4, sink_size: 8 }
    )));
}

#[test]
fn test_type_change_after_connecting_is_reported() {
    let platform = create_platform();
    let (mut graph, [_, throttle, _]) = create_simple_chain(&platform);
    graph.set_param(throttle, "type", "float").unwrap();
    rewrite(&mut graph);

    let diagnostics = diagnostics(&graph);
    assert_eq!(
        count(&diagnostics, |e| matches!(e, ValidationError::IncompatibleTypes { .. })),
        2
    );
}

#[test]
fn test_invalid_option_value() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();
    graph.set_param(sink, "type", "bits").unwrap();
    rewrite(&mut graph);

    let diagnostics = diagnostics(&graph);
    assert_eq!(
        count(&diagnostics, |e| matches!(e, ValidationError::InvalidOption { .. })),
        1
    );
    assert_eq!(
        count(&diagnostics, |e| matches!(e, ValidationError::UnknownPortType { .. })),
        1
    );
}

#[test]
fn test_option_matches_evaluated_value() {
    let mut graph = FlowGraph::new();
    let definition = BlockDefinition::new("mode_blk", "Mode").param(
        ParamDefinition::new("mode", ValueKind::Int, "1").options(OptionSource::Fixed(vec![
            ParamOption::new("1", "One"),
            ParamOption::new("2", "Two"),
        ])),
    );
    let block = graph.add_block(&definition).unwrap();
    graph.set_param(block, "mode", "1 + 1").unwrap();
    rewrite(&mut graph);

    assert_eq!(graph.param_value(block, "mode"), Some(&Value::Int(2)));
    assert_eq!(graph.validate().count(), 0);
    let param = graph.block(block).unwrap().param("mode").unwrap();
    assert_eq!(param.selected_option().map(|o| o.name.as_str()), Some("Two"));

    graph.set_param(block, "mode", "1 + 2").unwrap();
    rewrite(&mut graph);
    let diagnostics = diagnostics(&graph);
    assert!(matches!(
        diagnostics.as_slice(),
        [Diagnostic { error: ValidationError::InvalidOption { value, .. }, .. }] if value == "3"
    ));
}

#[test]
fn test_foreign_element_ids_are_rejected() {
    let platform = create_platform();
    let (mut graph, [_, throttle, _]) = create_simple_chain(&platform);
    let (other, [other_source, _, other_sink]) = create_simple_chain(&platform);

    assert!(graph.block(other_source).is_none());
    assert!(other.block(other_source).is_some());
    assert!(graph.describe(other_sink).is_none());

    let before = graph.connections().to_vec();
    assert!(matches!(
        graph.make_connection(
            Endpoint::source(other_source, "out"),
            Endpoint::sink(throttle, "in")
        ),
        Err(ConnectionError::UnknownBlock(id)) if id == other_source
    ));
    assert!(matches!(
        graph.make_connection(Endpoint::source(throttle, "out"), Endpoint::sink(other_sink, "in")),
        Err(ConnectionError::UnknownBlock(_))
    ));
    assert_eq!(graph.connections(), before.as_slice());

    assert!(matches!(
        graph.remove(&[other_source]),
        Err(GraphError::UnknownElement(_))
    ));
    assert!(matches!(
        graph.set_param(other_source, "freq", "1"),
        Err(GraphError::UnknownElement(_))
    ));
}

#[test]
fn test_describe_elements() {
    let platform = create_platform();
    let (graph, [source, _, _]) = create_simple_chain(&platform);
    let block = graph.block(source).unwrap();
    let param = block.param("freq").unwrap().element;
    let port = block.raw_ports(Direction::Source)[0].element;
    let connection = graph.connections()[0].element;

    assert_eq!(graph.describe(source).as_deref(), Some("block signal_source_0"));
    assert_eq!(graph.describe(param).as_deref(), Some("param signal_source_0.freq"));
    assert_eq!(graph.describe(port).as_deref(), Some("source port signal_source_0:out"));
    assert_eq!(
        graph.describe(connection).as_deref(),
        Some("connection signal_source_0:out -> throttle_0:in")
    );
    assert_eq!(
        graph.tree().ancestor_of_kind(port, ElementKind::Block),
        Some(source)
    );
}

#[test]
fn test_unknown_param_and_element() {
    let platform = create_platform();
    let mut graph = platform.new_flow_graph();
    let sink = graph.add_block_from(&platform, "null_sink").unwrap();

    assert!(matches!(
        graph.set_param(sink, "gain", "1"),
        Err(GraphError::UnknownParam { .. })
    ));
    graph.remove(&[sink]).unwrap();
    assert!(matches!(
        graph.set_param(sink, "type", "float"),
        Err(GraphError::UnknownElement(_))
    ));
}
