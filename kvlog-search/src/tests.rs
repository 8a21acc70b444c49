//! End-to-end deserializer tests driving encoded streams through query
//! evaluation and the unit handler.

use kvlog_common::ErrorKind;
use kvlog_format::{
    encode::StreamWriter,
    protocol::EncodingType,
    LogEvent, Namespace, NodeId, NodeLocator, NodeType, SchemaTree, UtcOffset, Value,
};
use kvlog_io::BytesReader;
use serde_json::json;

use crate::{
    ast::{Expr, FilterOp, Query, QueryBuilder},
    deserializer::{Deserializer, UnitStatus},
    handler::{HandlerError, HandlerResult, UnitHandler},
    literal::Literal,
};

/// Records every callback for assertions.
#[derive(Debug, Default)]
struct RecordingHandler {
    /// `(user-namespace JSON, utc offset seconds)` per accepted event.
    events: Vec<(String, i64)>,
    insertions: Vec<(Namespace, String)>,
    offset_changes: Vec<(i64, i64)>,
    projections: Vec<(Namespace, u32, String)>,
    end_of_stream_calls: usize,
    /// When set, every callback fails with this code.
    fail_with: Option<u32>,
}

impl RecordingHandler {
    fn check(&self) -> HandlerResult {
        match self.fail_with {
            Some(code) => Err(HandlerError::new(code)),
            None => Ok(()),
        }
    }
}

impl UnitHandler for RecordingHandler {
    fn handle_log_event(&mut self, event: LogEvent<'_>) -> HandlerResult {
        self.check()?;
        self.events.push((
            event.to_json(Namespace::User),
            event.utc_offset().as_seconds(),
        ));
        Ok(())
    }

    fn handle_schema_tree_node_insertion(
        &mut self,
        namespace: Namespace,
        locator: &NodeLocator,
        tree: &SchemaTree,
    ) -> HandlerResult {
        self.check()?;
        // The tree handed to the callback already contains the new node.
        assert!(tree.contains(locator));
        self.insertions.push((namespace, locator.name.clone()));
        Ok(())
    }

    fn handle_utc_offset_change(&mut self, old: UtcOffset, new: UtcOffset) -> HandlerResult {
        self.check()?;
        self.offset_changes
            .push((old.as_seconds(), new.as_seconds()));
        Ok(())
    }

    fn handle_end_of_stream(&mut self) -> HandlerResult {
        self.check()?;
        self.end_of_stream_calls += 1;
        Ok(())
    }

    fn handle_projection_resolution(
        &mut self,
        namespace: Namespace,
        node_id: NodeId,
        path: &str,
    ) -> HandlerResult {
        self.check()?;
        self.projections
            .push((namespace, node_id.as_u32(), path.to_string()));
        Ok(())
    }
}

fn encode_stream(build: impl FnOnce(&mut StreamWriter<Vec<u8>>)) -> BytesReader {
    let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
    writer.write_preamble(&json!({"version": "v0.1"})).unwrap();
    build(&mut writer);
    BytesReader::new(writer.into_inner())
}

fn user_node(writer: &mut StreamWriter<Vec<u8>>, parent: u32, name: &str, node_type: NodeType) {
    writer
        .write_schema_tree_node(
            Namespace::User,
            &NodeLocator::new(NodeId::from(parent), name, node_type),
        )
        .unwrap();
}

fn user_event(writer: &mut StreamWriter<Vec<u8>>, pairs: &[(u32, Value)]) {
    let pairs: Vec<(NodeId, Value)> = pairs
        .iter()
        .map(|(id, value)| (NodeId::from(*id), value.clone()))
        .collect();
    writer.write_log_event(&[], &pairs).unwrap();
}

fn drain(
    deserializer: &mut Deserializer<RecordingHandler>,
    reader: &mut BytesReader,
) -> Vec<UnitStatus> {
    let mut statuses = Vec::new();
    loop {
        let status = deserializer.deserialize_next_unit(reader).unwrap();
        statuses.push(status);
        if status == UnitStatus::EndOfStream {
            return statuses;
        }
    }
}

fn int_eq_query(path: &str, value: i64) -> Query {
    let mut builder = QueryBuilder::new();
    let column = builder.column(path).unwrap();
    builder.build(Expr::filter(column, FilterOp::Eq, Literal::Int(value)))
}

#[test]
fn test_minimal_stream_empty_query() {
    let mut reader = encode_stream(|w| {
        w.write_end_of_stream().unwrap();
    });
    let mut deserializer =
        Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap();

    let statuses = drain(&mut deserializer, &mut reader);
    assert_eq!(statuses, vec![UnitStatus::EndOfStream]);
    assert!(deserializer.is_stream_completed());
    assert_eq!(deserializer.handler().end_of_stream_calls, 1);

    // Reading past the end is not permitted, even with bytes available.
    let err = deserializer.deserialize_next_unit(&mut reader).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotPermitted { .. }));
    assert_eq!(deserializer.handler().end_of_stream_calls, 1);
}

#[test]
fn test_metadata_is_exposed() {
    let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
    writer
        .write_preamble(&json!({
            "version": "v0.1",
            "user_defined_metadata": {"origin": "unit-test"},
        }))
        .unwrap();
    writer.write_end_of_stream().unwrap();
    let mut reader = BytesReader::new(writer.into_inner());

    let deserializer =
        Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap();
    assert_eq!(
        deserializer.metadata()["user_defined_metadata"]["origin"],
        "unit-test"
    );
    assert_eq!(deserializer.encoding(), EncodingType::EightByte);
}

#[test]
fn test_single_literal_column_filtering() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "a", NodeType::Obj); // id 1
        user_node(w, 1, "b", NodeType::Int); // id 2
        user_event(w, &[(2, Value::Int(42))]);
        user_event(w, &[(2, Value::Int(7))]);
        user_event(w, &[]);
        w.write_end_of_stream().unwrap();
    });
    let query = int_eq_query("user:a.b", 42);
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();

    let statuses = drain(&mut deserializer, &mut reader);
    assert_eq!(
        statuses,
        vec![
            UnitStatus::SchemaTreeNodeInsertion,
            UnitStatus::SchemaTreeNodeInsertion,
            UnitStatus::LogEvent,
            UnitStatus::FilteredLogEvent,
            UnitStatus::FilteredLogEvent,
            UnitStatus::EndOfStream,
        ]
    );
    let handler = deserializer.handler();
    assert_eq!(handler.events.len(), 1);
    assert_eq!(handler.events[0].0, r#"{"a":{"b":42}}"#);
    assert_eq!(
        handler.insertions,
        vec![
            (Namespace::User, "a".to_string()),
            (Namespace::User, "b".to_string()),
        ]
    );
}

#[test]
fn test_wildcard_descent_with_zero_width_match() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "x", NodeType::Obj); // id 1
        user_node(w, 1, "y", NodeType::Obj); // id 2
        user_node(w, 2, "z", NodeType::Int); // id 3
        user_node(w, 1, "z", NodeType::Int); // id 4
        user_event(w, &[(3, Value::Int(5))]);
        user_event(w, &[(4, Value::Int(5))]);
        user_event(w, &[(3, Value::Int(-1))]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new();
    let column = builder.column("user:x.*.z").unwrap();
    let query = builder.build(Expr::filter(column, FilterOp::Gt, Literal::Int(0)));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();

    let statuses = drain(&mut deserializer, &mut reader);
    let event_statuses: Vec<UnitStatus> = statuses
        .iter()
        .copied()
        .filter(|s| matches!(s, UnitStatus::LogEvent | UnitStatus::FilteredLogEvent))
        .collect();
    assert_eq!(
        event_statuses,
        vec![
            UnitStatus::LogEvent,
            UnitStatus::LogEvent,
            UnitStatus::FilteredLogEvent,
        ]
    );
}

#[test]
fn test_projection_resolution_reported_once() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "a", NodeType::Obj); // id 1
        user_node(w, 1, "b", NodeType::Str); // id 2
        w.write_end_of_stream().unwrap();
    });
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        None,
        &["user:a.b".to_string()],
    )
    .unwrap();
    drain(&mut deserializer, &mut reader);
    let handler = deserializer.into_handler();
    assert_eq!(
        handler.projections,
        vec![(Namespace::User, 2, "user:a.b".to_string())]
    );
}

#[test]
fn test_pure_wildcard_filter() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "greeting", NodeType::Str); // id 1
        user_event(w, &[(1, Value::Str("hello".into()))]);
        user_event(w, &[(1, Value::Str("goodbye".into()))]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new();
    let column = builder.column("*").unwrap();
    let query = builder.build(Expr::filter(
        column,
        FilterOp::Eq,
        Literal::VarString("hello".into()),
    ));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();

    let statuses = drain(&mut deserializer, &mut reader);
    assert!(statuses.contains(&UnitStatus::LogEvent));
    let handler = deserializer.handler();
    assert_eq!(handler.events.len(), 1);
    assert_eq!(handler.events[0].0, r#"{"greeting":"hello"}"#);
}

#[test]
fn test_conjunction_prunes_on_unresolved_column() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "a", NodeType::Obj); // id 1
        user_node(w, 1, "b", NodeType::Int); // id 2
        // c.d never appears in the stream.
        user_event(w, &[(2, Value::Int(1))]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new();
    let ab = builder.column("user:a.b").unwrap();
    let cd = builder.column("user:c.d").unwrap();
    let query = builder.build(Expr::and(vec![
        Expr::filter(ab, FilterOp::Eq, Literal::Int(1)),
        Expr::filter(cd, FilterOp::Eq, Literal::Int(2)),
    ]));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();

    let statuses = drain(&mut deserializer, &mut reader);
    assert!(statuses.contains(&UnitStatus::FilteredLogEvent));
    assert!(deserializer.handler().events.is_empty());
}

#[test]
fn test_combinator_order_independence() {
    // Swapping And (or Or) operands must not change the verdict, even
    // when one operand prunes.
    let stream = || {
        encode_stream(|w| {
            user_node(w, 0, "a", NodeType::Obj); // id 1
            user_node(w, 1, "b", NodeType::Int); // id 2
            user_event(w, &[(2, Value::Int(1))]);
            w.write_end_of_stream().unwrap();
        })
    };
    for swapped in [false, true] {
        let mut builder = QueryBuilder::new();
        let ab = builder.column("user:a.b").unwrap();
        let cd = builder.column("user:c.d").unwrap();
        let mut operands = vec![
            Expr::filter(ab, FilterOp::Eq, Literal::Int(1)),
            Expr::filter(cd, FilterOp::Eq, Literal::Int(2)),
        ];
        if swapped {
            operands.reverse();
        }
        let query = builder.build(Expr::and(operands));
        let mut reader = stream();
        let mut d = Deserializer::new(&mut reader, RecordingHandler::default(), Some(query), &[])
            .unwrap();
        // The unresolved c.d prunes the conjunction in either position.
        assert!(drain(&mut d, &mut reader).contains(&UnitStatus::FilteredLogEvent));
    }
}

#[test]
fn test_disjunction_prune_semantics() {
    let stream = |pairs: Vec<(u32, Value)>| {
        encode_stream(move |w| {
            user_node(w, 0, "a", NodeType::Obj); // id 1
            user_node(w, 1, "b", NodeType::Int); // id 2
            user_event(w, &pairs);
            w.write_end_of_stream().unwrap();
        })
    };
    let query = || {
        let mut builder = QueryBuilder::new();
        let ab = builder.column("user:a.b").unwrap();
        let cd = builder.column("user:c.d").unwrap();
        builder.build(Expr::or(vec![
            Expr::filter(ab, FilterOp::Eq, Literal::Int(1)),
            Expr::filter(cd, FilterOp::Eq, Literal::Int(2)),
        ]))
    };

    // One branch resolves and matches: the event survives.
    let mut reader = stream(vec![(2, Value::Int(1))]);
    let mut d =
        Deserializer::new(&mut reader, RecordingHandler::default(), Some(query()), &[]).unwrap();
    assert!(drain(&mut d, &mut reader).contains(&UnitStatus::LogEvent));

    // One branch resolves but fails, the other prunes: False, dropped.
    let mut reader = stream(vec![(2, Value::Int(9))]);
    let mut d =
        Deserializer::new(&mut reader, RecordingHandler::default(), Some(query()), &[]).unwrap();
    assert!(drain(&mut d, &mut reader).contains(&UnitStatus::FilteredLogEvent));

    // Neither branch sees its column: all-prune, dropped.
    let mut reader = stream(vec![]);
    let mut d =
        Deserializer::new(&mut reader, RecordingHandler::default(), Some(query()), &[]).unwrap();
    assert!(drain(&mut d, &mut reader).contains(&UnitStatus::FilteredLogEvent));
}

#[test]
fn test_utc_offset_change_applies_to_later_events() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "n", NodeType::Int); // id 1
        user_event(w, &[(1, Value::Int(1))]);
        w.write_utc_offset_change(UtcOffset::new(3600)).unwrap();
        user_event(w, &[(1, Value::Int(2))]);
        w.write_end_of_stream().unwrap();
    });
    let mut deserializer =
        Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap();
    drain(&mut deserializer, &mut reader);

    let handler = deserializer.handler();
    assert_eq!(handler.offset_changes, vec![(0, 3600)]);
    assert_eq!(handler.events[0].1, 0);
    assert_eq!(handler.events[1].1, 3600);
    assert_eq!(deserializer.utc_offset(), UtcOffset::new(3600));
}

#[test]
fn test_case_insensitive_string_match() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "level", NodeType::Str); // id 1
        user_event(w, &[(1, Value::Str("ERROR".into()))]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new().case_insensitive();
    let level = builder.column("user:level").unwrap();
    let query = builder.build(Expr::filter(
        level,
        FilterOp::Eq,
        Literal::VarString("err*".into()),
    ));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    assert!(drain(&mut deserializer, &mut reader).contains(&UnitStatus::LogEvent));
}

#[test]
fn test_namespaces_do_not_cross_resolve() {
    // The same key path exists in both trees; an auto-namespace query
    // must only see the auto-namespace pair.
    let mut reader = encode_stream(|w| {
        w.write_schema_tree_node(
            Namespace::Auto,
            &NodeLocator::new(NodeId::ROOT, "seq", NodeType::Int),
        )
        .unwrap(); // auto id 1
        user_node(w, 0, "seq", NodeType::Int); // user id 1
        // Auto pair says 10, user pair says 99.
        writer_pairs(w, &[(1, Value::Int(10))], &[(1, Value::Int(99))]);
        w.write_end_of_stream().unwrap();
    });
    let query = int_eq_query("auto:seq", 10);
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    assert!(drain(&mut deserializer, &mut reader).contains(&UnitStatus::LogEvent));

    let mut reader = encode_stream(|w| {
        w.write_schema_tree_node(
            Namespace::Auto,
            &NodeLocator::new(NodeId::ROOT, "seq", NodeType::Int),
        )
        .unwrap();
        user_node(w, 0, "seq", NodeType::Int);
        writer_pairs(w, &[(1, Value::Int(99))], &[(1, Value::Int(10))]);
        w.write_end_of_stream().unwrap();
    });
    let query = int_eq_query("auto:seq", 10);
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    assert!(drain(&mut deserializer, &mut reader).contains(&UnitStatus::FilteredLogEvent));
}

fn writer_pairs(writer: &mut StreamWriter<Vec<u8>>, auto: &[(u32, Value)], user: &[(u32, Value)]) {
    let auto: Vec<(NodeId, Value)> = auto
        .iter()
        .map(|(id, value)| (NodeId::from(*id), value.clone()))
        .collect();
    let user: Vec<(NodeId, Value)> = user
        .iter()
        .map(|(id, value)| (NodeId::from(*id), value.clone()))
        .collect();
    writer.write_log_event(&auto, &user).unwrap();
}

#[test]
fn test_duplicate_schema_node_insertion_is_protocol_error() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "a", NodeType::Int);
        user_node(w, 0, "a", NodeType::Int);
    });
    let mut deserializer =
        Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap();
    deserializer.deserialize_next_unit(&mut reader).unwrap();
    let err = deserializer.deserialize_next_unit(&mut reader).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol { .. }));
}

#[test]
fn test_unsupported_version_rejected() {
    let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
    writer.write_preamble(&json!({"version": "v9.9"})).unwrap();
    let mut reader = BytesReader::new(writer.into_inner());
    let err = Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotSupported { .. }));
}

#[test]
fn test_missing_version_rejected() {
    let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
    writer.write_preamble(&json!({})).unwrap();
    let mut reader = BytesReader::new(writer.into_inner());
    let err = Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol { .. }));
}

#[test]
fn test_non_object_user_metadata_rejected() {
    let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
    writer
        .write_preamble(&json!({"version": "v0.1", "user_defined_metadata": "nope"}))
        .unwrap();
    let mut reader = BytesReader::new(writer.into_inner());
    let err = Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotSupported { .. }));
}

#[test]
fn test_malformed_metadata_json_rejected() {
    use kvlog_format::protocol::tag;
    let bytes = vec![
        tag::ENCODING_EIGHT_BYTE,
        tag::METADATA_JSON,
        0x02, // declared length
        b'{',
        b'x',
    ];
    let mut reader = BytesReader::new(bytes);
    let err = Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Protocol { .. }));
}

#[test]
fn test_truncated_stream() {
    let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
    writer.write_preamble(&json!({"version": "v0.1"})).unwrap();
    user_node(&mut writer, 0, "a", NodeType::Int);
    let mut bytes = writer.into_inner();
    bytes.truncate(bytes.len() - 2);

    let mut reader = BytesReader::new(bytes);
    let mut deserializer =
        Deserializer::new(&mut reader, RecordingHandler::default(), None, &[]).unwrap();
    let err = deserializer.deserialize_next_unit(&mut reader).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Truncated { .. }));
}

#[test]
fn test_projection_argument_validation() {
    let preamble_bytes = || {
        let mut writer = StreamWriter::new(Vec::new(), EncodingType::EightByte);
        writer.write_preamble(&json!({"version": "v0.1"})).unwrap();
        writer.into_inner()
    };

    for projections in [
        vec!["user:a.b".to_string(), "user:a.b".to_string()],
        vec!["".to_string()],
        vec!["user:a.*".to_string()],
        vec!["*".to_string()],
    ] {
        let mut reader = BytesReader::new(preamble_bytes());
        let err = Deserializer::new(
            &mut reader,
            RecordingHandler::default(),
            None,
            &projections,
        )
        .unwrap_err();
        assert!(
            matches!(err.kind(), ErrorKind::InvalidArgument { .. }),
            "projections {projections:?} produced {err}"
        );
    }

    // The same path in different namespaces is not a duplicate.
    let mut reader = BytesReader::new(preamble_bytes());
    assert!(Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        None,
        &["auto:a.b".to_string(), "user:a.b".to_string()],
    )
    .is_ok());
}

#[test]
fn test_handler_failure_codes_propagate() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "a", NodeType::Int);
        w.write_end_of_stream().unwrap();
    });
    let handler = RecordingHandler {
        fail_with: Some(17),
        ..Default::default()
    };
    let mut deserializer = Deserializer::new(&mut reader, handler, None, &[]).unwrap();
    let err = deserializer.deserialize_next_unit(&mut reader).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Handler { code: 17 }));

    // The stream itself is intact; once the handler recovers, the caller
    // may keep consuming units.
    deserializer.handler_mut().fail_with = None;
    assert_eq!(
        deserializer.deserialize_next_unit(&mut reader).unwrap(),
        UnitStatus::EndOfStream
    );
}

#[test]
fn test_regex_token_behaves_as_wildcard() {
    use crate::column::{ColumnDescriptor, DescriptorToken};

    let mut reader = encode_stream(|w| {
        user_node(w, 0, "ctx", NodeType::Obj); // id 1
        user_node(w, 1, "code", NodeType::Int); // id 2
        user_event(w, &[(2, Value::Int(500))]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new();
    // Regex tokens are reserved; until they are implemented they match
    // like wildcards.
    let column = builder.column_descriptor(ColumnDescriptor::new(
        Namespace::User,
        vec![
            DescriptorToken::Literal("ctx".to_string()),
            DescriptorToken::Regex("code|status".to_string()),
        ],
        "user:ctx.re".to_string(),
    ));
    let query = builder.build(Expr::filter(column, FilterOp::Gte, Literal::Int(500)));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    assert!(drain(&mut deserializer, &mut reader).contains(&UnitStatus::LogEvent));
}

#[test]
fn test_unsatisfiable_query_drops_every_event() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "flag", NodeType::Bool); // id 1
        user_event(w, &[(1, Value::Bool(true))]);
        w.write_end_of_stream().unwrap();
    });
    // flag == true AND NOT flag == true is unsatisfiable after
    // normalization only if the engine could see through it; type
    // narrowing alone cannot, but an Int literal on a bool-only column
    // can: force the contradiction through the type system.
    let mut builder = QueryBuilder::new();
    let flag = builder.column("user:flag").unwrap();
    let query = builder.build(Expr::and(vec![
        Expr::filter(flag, FilterOp::Eq, Literal::Bool(true)),
        Expr::filter(flag, FilterOp::Eq, Literal::Int(3)),
    ]));
    // Both filters share one column descriptor: Bool narrows it to
    // Boolean, the Int literal then has an empty intersection, folding
    // the whole conjunction to Empty.
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    let statuses = drain(&mut deserializer, &mut reader);
    assert!(statuses.contains(&UnitStatus::FilteredLogEvent));
    assert!(deserializer.handler().events.is_empty());
}

#[test]
fn test_exists_query_via_wildcard_string() {
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "ctx", NodeType::Obj); // id 1
        user_node(w, 1, "host", NodeType::Str); // id 2
        user_event(w, &[(2, Value::Str("worker-3".into()))]);
        user_event(w, &[]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new();
    let host = builder.column("user:ctx.host").unwrap();
    // `== "*"` converts to an existence check during preprocessing.
    let query = builder.build(Expr::filter(
        host,
        FilterOp::Eq,
        Literal::VarString("*".into()),
    ));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    let statuses = drain(&mut deserializer, &mut reader);
    let event_statuses: Vec<UnitStatus> = statuses
        .iter()
        .copied()
        .filter(|s| matches!(s, UnitStatus::LogEvent | UnitStatus::FilteredLogEvent))
        .collect();
    assert_eq!(
        event_statuses,
        vec![UnitStatus::LogEvent, UnitStatus::FilteredLogEvent]
    );
}

#[test]
fn test_encoded_text_value_matches_string_filter() {
    use kvlog_format::encoded_text::{placeholder, EightByteEncodedTextAst};

    let ast = EightByteEncodedTextAst::new(
        format!("request took {}ms", placeholder::INT_VAR),
        vec![],
        vec![250i64],
    );
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "msg", NodeType::Str); // id 1
        user_event(w, &[(1, Value::EncodedText8(ast.clone()))]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new();
    let msg = builder.column("user:msg").unwrap();
    let query = builder.build(Expr::filter(
        msg,
        FilterOp::Eq,
        Literal::ClpString("request took *ms".into()),
    ));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    let statuses = drain(&mut deserializer, &mut reader);
    assert!(statuses.contains(&UnitStatus::LogEvent));
    assert_eq!(
        deserializer.handler().events[0].0,
        r#"{"msg":"request took 250ms"}"#
    );
}

#[test]
fn test_query_continues_matching_as_schema_grows() {
    // The same query resolves additional nodes as later insertions
    // arrive; earlier resolutions stay valid.
    let mut reader = encode_stream(|w| {
        user_node(w, 0, "m", NodeType::Obj); // id 1
        user_node(w, 1, "v", NodeType::Int); // id 2
        user_event(w, &[(2, Value::Int(1))]);
        user_node(w, 1, "w", NodeType::Obj); // id 3
        user_node(w, 3, "v", NodeType::Int); // id 4 (matches m.*.v too)
        user_event(w, &[(4, Value::Int(1))]);
        user_event(w, &[(2, Value::Int(1))]);
        w.write_end_of_stream().unwrap();
    });
    let mut builder = QueryBuilder::new();
    let column = builder.column("user:m.*.v").unwrap();
    let query = builder.build(Expr::filter(column, FilterOp::Eq, Literal::Int(1)));
    let mut deserializer = Deserializer::new(
        &mut reader,
        RecordingHandler::default(),
        Some(query),
        &[],
    )
    .unwrap();
    let statuses = drain(&mut deserializer, &mut reader);
    let events: Vec<UnitStatus> = statuses
        .iter()
        .copied()
        .filter(|s| matches!(s, UnitStatus::LogEvent | UnitStatus::FilteredLogEvent))
        .collect();
    // All three events carry a matching pair (id 2 matches via the
    // zero-width wildcard, id 4 via the one-level descent).
    assert_eq!(
        events,
        vec![
            UnitStatus::LogEvent,
            UnitStatus::LogEvent,
            UnitStatus::LogEvent,
        ]
    );
}
