/////////////////////////////TESTS////////////////////////////////////////////////////
/*
parser tests:
title and key parsing
typed values
value lists, including empty ones
sections and documents
comment filtering
malformed documents
*/

#[cfg(test)]
mod tests1 {

    use crate::Utils::task_parser::{
        Value, filter_comments, parse_document_as, parse_key, parse_key_value_pair, parse_section,
        parse_title, parse_value, parse_value_list,
    };

    #[test]
    fn test_parse_title_and_key() {
        let (remaining, title) = parse_title("solver\n mode: 6d").unwrap();
        assert_eq!(title, "solver");
        assert_eq!(remaining, "mode: 6d");
        let (remaining, title) = parse_title("title_with_underscore key1: value1").unwrap();
        assert_eq!(title, "title_with_underscore");
        assert_eq!(remaining, "key1: value1");
        let (remaining, key) = parse_key("branch_tolerance: 1e-4").unwrap();
        assert_eq!(key, "branch_tolerance");
        assert_eq!(remaining, ": 1e-4");
        assert!(parse_key("1key: 2").is_err());
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42").unwrap().1, Value::Integer(42));
        assert_eq!(parse_value("1e-4").unwrap().1, Value::Float(1e-4));
        assert_eq!(parse_value("true").unwrap().1, Value::Boolean(true));
        assert_eq!(parse_value("6d").unwrap().1, Value::String("6d".to_string()));
        let (remaining, v) = parse_value("ik.log, more").unwrap();
        assert_eq!(v.as_string().unwrap(), "ik.log");
        assert_eq!(remaining, ", more");
        assert_eq!(Value::Integer(3).as_float(), Some(3.0));
        assert_eq!(Value::Boolean(false).as_float(), None);
        assert_eq!(Value::Float(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_parse_value_list() {
        let (_, values) = parse_value_list("0, 3 ,5").unwrap();
        assert_eq!(values, vec![Value::Integer(0), Value::Integer(3), Value::Integer(5)]);
        let (remaining, values) = parse_value_list("\nnext: 1").unwrap();
        assert!(values.is_empty());
        assert_eq!(remaining, "\nnext: 1");
    }

    #[test]
    fn test_parse_key_value_pair() {
        let (remaining, (key, values)) = parse_key_value_pair("free_joints: 0, 2\n  mode: 6d").unwrap();
        assert_eq!(key, "free_joints");
        assert_eq!(values.len(), 2);
        assert_eq!(remaining, "mode: 6d");
    }

    #[test]
    fn test_parse_section() {
        let (remaining, (title, map)) =
            parse_section("solver\n  mode: rotation3d\n  free_joints:\ngenerator\n  emit_main: true").unwrap();
        assert_eq!(title, "solver");
        assert_eq!(map["mode"], vec![Value::String("rotation3d".to_string())]);
        assert!(map["free_joints"].is_empty());
        assert!(remaining.starts_with("generator"));
    }

    #[test]
    fn test_filter_comments() {
        let doc = "// header\nsolver\n# hash\n  mode: 6d\n% percent\n; semi\n\n";
        assert_eq!(filter_comments(doc), "solver\n  mode: 6d");
    }

    #[test]
    fn test_parse_document() {
        let doc = "
        // compiler settings
        solver
          mode: 6d
          free_joints: 0
        logging
          level: debug
        ";
        let map = parse_document_as(doc).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["solver"]["free_joints"], vec![Value::Integer(0)]);
        assert_eq!(map["logging"]["level"][0].as_string().unwrap(), "debug");
        assert!(parse_document_as("// nothing\n").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse_document_as("solver\n  mode 6d").is_err());
        assert!(parse_document_as("solver\n  mode: 6d\nsolver\n  mode: 6d").is_err());
        assert!(parse_document_as("solver\n  mode: 6d\n  !!").is_err());
    }
}
