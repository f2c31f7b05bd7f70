//! Common test utilities for building catalogs and flow graphs.
use flowgraph::prelude::*;

fn type_param() -> ParamDefinition {
    ParamDefinition::new("type", ValueKind::String, "complex")
        .named("IO Type")
        .options(OptionSource::Fixed(vec![
            ParamOption::new("complex", "Complex").with_extra("size", "8"),
            ParamOption::new("float", "Float").with_extra("size", "4"),
            ParamOption::new("int", "Int").with_extra("size", "4"),
            ParamOption::new("short", "Short").with_extra("size", "2"),
        ]))
}

fn typed() -> Attr<String> {
    Attr::param("type")
}

/// A small catalog covering every port feature.
///
/// * `signal_source` - one stream source typed by `type`
/// * `throttle` - stream sink and source typed by `type`
/// * `add` - `num_inputs` stream sinks (multiplicity) and one source
/// * `null_sink` - one stream sink typed by `type`
/// * `vector_sink` - stream sink with a `vlen` bound vector length
/// * `message_strobe` - one message source
/// * `tagged_sink` - stream sink plus a `cmd` message sink enabled by `show_cmd`
/// * `message_debug` - message sinks added by a setup hook
#[allow(dead_code)]
pub fn create_platform() -> Platform {
    let mut platform = Platform::new("test").with_version("3.7.2");

    let definitions = vec![
        BlockDefinition::new("signal_source", "Signal Source")
            .param(type_param())
            .param(ParamDefinition::new("freq", ValueKind::Float, "1000").named("Frequency"))
            .port(PortDefinition::stream("out", "source", typed())),
        BlockDefinition::new("throttle", "Throttle")
            .param(type_param())
            .param(ParamDefinition::new("samples_per_second", ValueKind::Float, "samp_rate"))
            .port(PortDefinition::stream("in", "sink", typed()))
            .port(PortDefinition::stream("out", "source", typed())),
        BlockDefinition::new("add", "Add")
            .param(type_param())
            .param(ParamDefinition::new("num_inputs", ValueKind::Int, "2").named("Num Inputs"))
            .port(
                PortDefinition::stream("in", "sink", typed())
                    .multiplicity(Attr::param("num_inputs")),
            )
            .port(PortDefinition::stream("out", "source", typed())),
        BlockDefinition::new("null_sink", "Null Sink")
            .param(type_param())
            .port(PortDefinition::stream("in", "sink", typed())),
        BlockDefinition::new("vector_sink", "Vector Sink")
            .param(type_param())
            .param(ParamDefinition::new("vlen", ValueKind::Int, "1").named("Vector Length"))
            .port(PortDefinition::stream("in", "sink", typed()).vlen(Attr::param("vlen"))),
        BlockDefinition::new("message_strobe", "Message Strobe")
            .param(ParamDefinition::new("period", ValueKind::Int, "1000"))
            .port(PortDefinition::message("strobe", "source")),
        BlockDefinition::new("tagged_sink", "Tagged Sink")
            .param(type_param())
            .param(ParamDefinition::new("show_cmd", ValueKind::Bool, "True"))
            .port(PortDefinition::stream("in", "sink", typed()))
            .port(
                PortDefinition::message("cmd", "sink")
                    .enabled(Attr::param("show_cmd"))
                    .optional(),
            ),
        BlockDefinition::new("message_debug", "Message Debug").with_setup(|builder| {
            builder.add_message_sink("print")?;
            builder.add_message_sink("store")?.optional = true;
            Ok(())
        }),
    ];

    for definition in definitions {
        platform
            .register(definition)
            .expect("test catalog definitions are valid");
    }
    platform
}

/// Rewrites the graph and fails the test on a circular dependency.
#[allow(dead_code)]
pub fn rewrite(graph: &mut FlowGraph) {
    graph.rewrite().expect("rewrite should not hit a cycle");
}

/// Connects `source:source_port` to `sink:sink_port`, failing the test on error.
#[allow(dead_code)]
pub fn connect(
    graph: &mut FlowGraph,
    source: ElementId,
    source_port: &str,
    sink: ElementId,
    sink_port: &str,
) -> ElementId {
    graph
        .make_connection(Endpoint::source(source, source_port), Endpoint::sink(sink, sink_port))
        .expect("connection should be accepted")
}

/// Builds `signal_source -> throttle -> null_sink` with a `samp_rate` variable.
#[allow(dead_code)]
pub fn create_simple_chain(platform: &Platform) -> (FlowGraph, [ElementId; 3]) {
    let mut graph = platform.new_flow_graph();
    graph.add_variable("samp_rate", "32000").unwrap();
    let source = graph.add_block_from(platform, "signal_source").unwrap();
    let throttle = graph.add_block_from(platform, "throttle").unwrap();
    let sink = graph.add_block_from(platform, "null_sink").unwrap();
    rewrite(&mut graph);
    connect(&mut graph, source, "out", throttle, "in");
    connect(&mut graph, throttle, "out", sink, "in");
    (graph, [source, throttle, sink])
}

/// Diagnostics of the graph, collected.
#[allow(dead_code)]
pub fn diagnostics(graph: &FlowGraph) -> Vec<Diagnostic> {
    graph.validate().collect()
}
