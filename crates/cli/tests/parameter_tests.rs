#[cfg(test)]
mod tests {
    use pline_cli::arguments::style::{determine, Style};
    use pline_cli::arguments::{positional_inputs, process_command_line};
    use pline_core::config::Settings;
    use pline_core::descriptor::PluginDescriptor;
    use pline_core::error::Error;
    use pline_core::pipeline::{Library, Pipeline};
    use pline_core::value::Value;
    use serde_json::json;

    fn pipeline() -> Pipeline {
        let mut library = Library::new();
        for descriptor in [
            json!({"id": "grep", "program": "grep", "options": [
                {"text": "pattern", "option": "e"},
                {"file": "input", "name": "input", "option": ""}
            ]}),
            json!({"id": "sort", "program": "sort", "options": [
                {"bool": "reverse", "option": "r"},
                {"text": "key", "name": "key", "option": ""}
            ]}),
        ] {
            library
                .add(PluginDescriptor::from_json(descriptor).unwrap(), None)
                .unwrap();
        }
        let mut pipeline = Pipeline::new(Settings::default());
        pipeline.push(&library, "grep").unwrap();
        pipeline.push(&library, "sort").unwrap();
        pipeline
    }

    #[test]
    fn test_parameter_mode_determination() {
        let empty: Vec<String> = vec![];
        assert!(matches!(determine(&empty, &empty).unwrap(), Style::None));

        let named = vec!["e=foo".to_string()];
        assert!(matches!(determine(&named, &empty).unwrap(), Style::Named(_)));

        let positional = vec!["input.txt".to_string()];
        assert!(matches!(
            determine(&empty, &positional).unwrap(),
            Style::Positional(_)
        ));

        assert!(determine(&named, &positional).is_err());
    }

    #[test]
    fn test_named_parameters_fill_steps() {
        let mut pipeline = pipeline();
        let style = Style::Named(vec!["pattern=foo".to_string(), "2:r=true".to_string()]);
        process_command_line(style, &mut pipeline).unwrap();

        assert_eq!(pipeline.step(0).unwrap().value("e"), Some(Value::from("foo")));
        assert_eq!(pipeline.step(1).unwrap().value("r"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_named_parameter_errors() {
        let mut pipeline = pipeline();
        assert!(matches!(
            process_command_line(Style::Named(vec!["missing=1".to_string()]), &mut pipeline),
            Err(Error::MissingParameter(name)) if name == "missing"
        ));
        assert!(matches!(
            process_command_line(Style::Named(vec!["3:e=x".to_string()]), &mut pipeline),
            Err(Error::UnknownStep(2))
        ));
        assert!(matches!(
            process_command_line(Style::Named(vec!["e".to_string()]), &mut pipeline),
            Err(Error::ParameterFormat(_))
        ));
    }

    #[test]
    fn test_positional_values_fill_in_order() {
        let mut pipeline = pipeline();
        let inputs = positional_inputs(&pipeline);
        let names: Vec<_> = inputs.iter().map(|(step, name)| (*step, name.as_str())).collect();
        assert_eq!(names, vec![(0, "input"), (1, "key")]);

        let style = Style::Positional(vec!["reads.txt".to_string(), "2".to_string()]);
        process_command_line(style, &mut pipeline).unwrap();
        assert_eq!(
            pipeline.step(0).unwrap().value("input"),
            Some(Value::from("reads.txt"))
        );
        assert_eq!(pipeline.step(1).unwrap().value("key"), Some(Value::from("2")));
    }

    #[test]
    fn test_positional_count_mismatch() {
        let mut pipeline = pipeline();
        let style = Style::Positional(vec!["only-one".to_string()]);
        assert!(matches!(
            process_command_line(style, &mut pipeline),
            Err(Error::ParameterCountMismatch(2, 1))
        ));
    }
}
