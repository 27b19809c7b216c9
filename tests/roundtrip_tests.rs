#![allow(missing_docs)]

use rdx::{
    deep_eq, is_na_real, CallData, ClosureData, Complex, PairCell, PromiseData, Rdx, Result,
    Session, Sexp, SexpId, VectorData, WireFormat, NA_INTEGER, NA_REAL,
};

// --- HELPERS ---

const ALL_FORMATS: [WireFormat; 3] = [WireFormat::Xdr, WireFormat::Ascii, WireFormat::Binary];

/// Encodes `root` in the given encoding and decodes it into a fresh session,
/// asserting deep structural equality.
fn round_trip_as(session: &Session, root: SexpId, format: WireFormat) -> (Session, SexpId) {
    let mut buffer = Vec::new();
    Rdx::write_as(session, &mut buffer, root, format).expect("encoding failed");

    let mut decoded_session = Session::new();
    let decoded = Rdx::read(&mut decoded_session, buffer.as_slice()).expect("decoding failed");
    assert!(
        deep_eq(session, root, &decoded_session, decoded),
        "graph mismatch after {format:?} round trip"
    );
    (decoded_session, decoded)
}

/// Round-trips through all three encodings.
fn round_trip_all(session: &Session, root: SexpId) {
    for format in ALL_FORMATS {
        round_trip_as(session, root, format);
    }
}

// --- VECTOR ROUND TRIPS ---

#[test]
fn null_root_round_trips() {
    let session = Session::new();
    let root = session.null();
    round_trip_all(&session, root);
}

#[test]
fn string_vector_with_na_round_trips() {
    let mut session = Session::new();
    let root = session.alloc(Sexp::Strings(VectorData::new(vec![
        Some("who".to_string()),
        Some("am".to_string()),
        Some("i".to_string()),
        None,
    ])));
    round_trip_all(&session, root);
}

#[test]
fn integer_vector_with_na_round_trips() {
    let mut session = Session::new();
    let root = session.alloc(Sexp::Ints(VectorData::new(vec![
        1,
        2,
        3,
        NA_INTEGER,
        4,
        i32::MAX,
        i32::MIN + 1,
    ])));
    round_trip_all(&session, root);
}

#[test]
fn logical_vector_with_na_round_trips() {
    let mut session = Session::new();
    let root = session.alloc(Sexp::Logicals(VectorData::new(vec![1, 0, NA_INTEGER])));
    round_trip_all(&session, root);
}

#[test]
fn double_specials_stay_distinct() {
    let mut session = Session::new();
    let values = vec![
        NA_REAL,
        f64::NAN,
        f64::INFINITY,
        f64::NEG_INFINITY,
        0.0,
        -0.0,
        1.5e300,
        f64::MIN_POSITIVE,
    ];
    let root = session.alloc(Sexp::Doubles(VectorData::new(values)));

    for format in ALL_FORMATS {
        let (decoded_session, decoded) = round_trip_as(&session, root, format);
        let Sexp::Doubles(vector) = decoded_session.get(decoded) else {
            panic!("expected a double vector");
        };
        assert!(is_na_real(vector.values[0]), "NA lost in {format:?}");
        assert!(vector.values[1].is_nan(), "NaN lost in {format:?}");
        assert!(
            !is_na_real(vector.values[1]),
            "ordinary NaN collapsed into NA in {format:?}"
        );
        assert_eq!(vector.values[2], f64::INFINITY);
        assert_eq!(vector.values[3], f64::NEG_INFINITY);
        assert!(vector.values[5].is_sign_negative(), "-0.0 lost its sign");
    }
}

#[test]
fn complex_vector_round_trips() {
    let mut session = Session::new();
    let root = session.alloc(Sexp::Complexes(VectorData::new(vec![
        Complex { re: 1.0, im: -2.0 },
        Complex {
            re: NA_REAL,
            im: f64::INFINITY,
        },
    ])));
    round_trip_all(&session, root);
}

#[test]
fn raw_vector_round_trips() {
    let mut session = Session::new();
    let root = session.alloc(Sexp::Raw(VectorData::new(vec![0x00, 0x0A, 0x5C, 0xFF, 0x20])));
    round_trip_all(&session, root);
}

#[test]
fn empty_vectors_round_trip() {
    let mut session = Session::new();
    let roots = [
        session.alloc(Sexp::Ints(VectorData::new(Vec::new()))),
        session.alloc(Sexp::Strings(VectorData::new(Vec::new()))),
        session.alloc(Sexp::Raw(VectorData::new(Vec::new()))),
        session.alloc(Sexp::List(VectorData::new(Vec::new()))),
    ];
    for root in roots {
        round_trip_all(&session, root);
    }
}

// --- STRUCTURED NODES ---

/// The canonical small workspace: `{a: ["who","am","i",NA], b: [1,2,3,NA,4]}`.
#[test]
fn named_pairlist_workspace_round_trips() {
    let mut session = Session::new();
    let a = session.alloc(Sexp::Strings(VectorData::new(vec![
        Some("who".to_string()),
        Some("am".to_string()),
        Some("i".to_string()),
        None,
    ])));
    let b = session.alloc(Sexp::Ints(VectorData::new(vec![1, 2, 3, NA_INTEGER, 4])));
    let root = session.named_pairlist([("a", a), ("b", b)]);
    round_trip_all(&session, root);
}

#[test]
fn vector_attributes_round_trip() {
    let mut session = Session::new();
    let dim = session.alloc(Sexp::Ints(VectorData::new(vec![2, 3])));
    let attributes = session.named_pairlist([("dim", dim)]);
    let root = session.alloc(Sexp::Doubles(VectorData {
        values: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        attributes: Some(attributes),
    }));
    round_trip_all(&session, root);
}

#[test]
fn class_attribute_round_trips_with_object_bit() {
    let mut session = Session::new();
    let class = session.alloc(Sexp::Strings(VectorData::new(vec![Some(
        "data.frame".to_string(),
    )])));
    let attributes = session.named_pairlist([("class", class)]);
    let column = session.alloc(Sexp::Ints(VectorData::new(vec![1, 2])));
    let root = session.alloc(Sexp::List(VectorData {
        values: vec![column],
        attributes: Some(attributes),
    }));
    round_trip_all(&session, root);
}

#[test]
fn generic_list_and_expressions_round_trip() {
    let mut session = Session::new();
    let inner = session.alloc(Sexp::Doubles(VectorData::new(vec![2.5])));
    let null = session.null();
    let list = session.alloc(Sexp::List(VectorData::new(vec![inner, null])));
    let symbol = session.intern("x");
    let expressions = session.alloc(Sexp::Expressions(VectorData::new(vec![symbol, list])));
    round_trip_all(&session, expressions);
}

#[test]
fn call_expression_round_trips() {
    let mut session = Session::new();
    let plus = session.intern("+");
    let x = session.intern("x");
    let one = session.alloc(Sexp::Doubles(VectorData::new(vec![1.0])));
    let null = session.null();
    let second = session.pair(None, one, null);
    let arguments = session.pair(None, x, second);
    let root = session.alloc(Sexp::Call(CallData {
        function: plus,
        arguments,
        attributes: None,
    }));
    round_trip_all(&session, root);
}

#[test]
fn sentinels_round_trip() {
    let session = Session::new();
    for root in [
        session.missing_arg(),
        session.unbound_value(),
        session.empty_env(),
        session.global_env(),
        session.base_env(),
        session.base_namespace(),
    ] {
        round_trip_all(&session, root);
    }
}

/// A closure whose second formal defaults to an unforced promise. Decoding
/// must keep the promise unforced: no value, environment and expression
/// intact.
#[test]
fn closure_with_unforced_promise_round_trips() -> Result<()> {
    let mut session = Session::new();

    let plus = session.intern("+");
    let x = session.intern("x");
    let one = session.alloc(Sexp::Doubles(VectorData::new(vec![1.0])));
    let null = session.null();
    let second = session.pair(None, one, null);
    let arguments = session.pair(None, x, second);
    let body = session.alloc(Sexp::Call(CallData {
        function: plus,
        arguments,
        attributes: None,
    }));

    // The default expression calls a second closure, so the promise stays
    // resolvable without being forced.
    let global = session.global_env();
    let y = session.intern("y");
    let null = session.null();
    let missing = session.missing_arg();
    let helper_formals = session.pair(Some(y), missing, null);
    let helper = session.alloc(Sexp::Closure(ClosureData {
        environment: global,
        formals: helper_formals,
        body: y,
        attributes: None,
    }));
    let x_arg = session.intern("x");
    let helper_args = session.pair(None, x_arg, null);
    let default_expr = session.alloc(Sexp::Call(CallData {
        function: helper,
        arguments: helper_args,
        attributes: None,
    }));
    let promise = session.alloc(Sexp::Promise(PromiseData {
        environment: Some(global),
        value: None,
        expression: default_expr,
        attributes: None,
    }));

    let missing = session.missing_arg();
    let d = session.intern("d");
    let null = session.null();
    let second_formal = session.pair(Some(d), promise, null);
    let x_tag = session.intern("x");
    let formals = session.pair(Some(x_tag), missing, second_formal);

    let root = session.alloc(Sexp::Closure(ClosureData {
        environment: global,
        formals,
        body,
        attributes: None,
    }));

    for format in ALL_FORMATS {
        let (decoded_session, decoded) = round_trip_as(&session, root, format);
        let Sexp::Closure(closure) = decoded_session.get(decoded) else {
            panic!("expected a closure");
        };
        assert_eq!(closure.environment, decoded_session.global_env());

        let Sexp::Pair(first) = decoded_session.get(closure.formals) else {
            panic!("expected a formals pairlist");
        };
        assert_eq!(first.value, decoded_session.missing_arg());
        let Sexp::Pair(second) = decoded_session.get(first.next) else {
            panic!("expected a second formal");
        };
        let Sexp::Promise(promise) = decoded_session.get(second.value) else {
            panic!("expected an unforced promise default");
        };
        assert_eq!(promise.value, None, "promise was forced during decode");
        assert_eq!(promise.environment, Some(decoded_session.global_env()));
        let Sexp::Call(call) = decoded_session.get(promise.expression) else {
            panic!("expected the default expression to survive unevaluated");
        };
        assert!(matches!(
            decoded_session.get(call.function),
            Sexp::Closure(_)
        ));
    }
    Ok(())
}

#[test]
fn forced_promise_keeps_its_value() {
    let mut session = Session::new();
    let value = session.alloc(Sexp::Ints(VectorData::new(vec![7])));
    let expression = session.intern("y");
    let root = session.alloc(Sexp::Promise(PromiseData {
        environment: None,
        value: Some(value),
        expression,
        attributes: None,
    }));

    let (decoded_session, decoded) = round_trip_as(&session, root, WireFormat::Xdr);
    let Sexp::Promise(promise) = decoded_session.get(decoded) else {
        panic!("expected a promise");
    };
    let forced = promise.value.expect("forced value lost");
    assert!(matches!(
        decoded_session.get(forced),
        Sexp::Ints(v) if v.values == [7]
    ));
}

/// A promise forced to Null is still forced; it must not collapse into an
/// unforced promise on decode.
#[test]
fn promise_forced_to_null_keeps_its_value() {
    let mut session = Session::new();
    let expression = session.intern("x");
    let null = session.null();
    let root = session.alloc(Sexp::Promise(PromiseData {
        environment: None,
        value: Some(null),
        expression,
        attributes: None,
    }));

    for format in ALL_FORMATS {
        let (decoded_session, decoded) = round_trip_as(&session, root, format);
        let Sexp::Promise(promise) = decoded_session.get(decoded) else {
            panic!("expected a promise");
        };
        assert_eq!(
            promise.value,
            Some(decoded_session.null()),
            "null value decoded as unforced in {format:?}"
        );
    }
}

#[test]
fn pairlist_cell_attributes_round_trip() {
    let mut session = Session::new();
    let note = session.alloc(Sexp::Strings(VectorData::new(vec![Some(
        "annotated".to_string(),
    )])));
    let cell_attributes = session.named_pairlist([("note", note)]);
    let value = session.alloc(Sexp::Ints(VectorData::new(vec![1])));
    let tag = session.intern("first");
    let null = session.null();
    let root = session.alloc(Sexp::Pair(PairCell {
        tag: Some(tag),
        value,
        next: null,
        attributes: Some(cell_attributes),
    }));
    round_trip_all(&session, root);
}

#[test]
fn deep_pairlist_chain_round_trips() {
    // Long chains exercise the iterative cell loops on both sides.
    let mut session = Session::new();
    let mut next = session.null();
    for i in 0..10_000 {
        let value = session.alloc(Sexp::Ints(VectorData::new(vec![i])));
        next = session.pair(None, value, next);
    }
    round_trip_all(&session, next);
}

// --- ASCII ENCODING DETAILS ---

#[test]
fn ascii_string_escapes_round_trip() {
    let mut session = Session::new();
    let root = session.alloc(Sexp::Strings(VectorData::new(vec![
        Some("tab\there".to_string()),
        Some("line\nbreak".to_string()),
        Some("back\\slash".to_string()),
        Some(" leading and trailing ".to_string()),
        Some("bell\u{7}feed\u{c}vert\u{b}".to_string()),
        Some("naïve café résumé".to_string()),
        Some(String::new()),
    ])));
    round_trip_as(&session, root, WireFormat::Ascii);
}

#[test]
fn ascii_numeric_tokens_round_trip() {
    let mut session = Session::new();
    let root = session.alloc(Sexp::Doubles(VectorData::new(vec![
        0.1,
        -1.0 / 3.0,
        6.02214076e23,
        5e-324,
    ])));
    round_trip_as(&session, root, WireFormat::Ascii);
}
