//! Single-file naming and structural checks.
//!
//! - Naming: function names in a module share one casing style
//! - Cohesion: god modules, god classes, long functions
//! - Layout: imports after definitions, missing module docstring
//! - Design hints: class names and methods suggesting a known pattern

use super::naming::{dominant_style, function_styles};
use super::{sort_patterns, Pattern, PatternKind, PatternThresholds};
use crate::analysis::{line_count, CodeEntity, EntityKind};
use crate::lang::Language;

/// Class name suffixes and the design pattern they usually signal.
const NAME_HINTS: &[(&str, &str)] = &[
    ("Factory", "factory"),
    ("Builder", "builder"),
    ("Observer", "observer"),
    ("Listener", "observer"),
    ("Subscriber", "observer"),
    ("Adapter", "adapter"),
    ("Wrapper", "adapter"),
    ("Strategy", "strategy"),
    ("Policy", "strategy"),
    ("Repository", "repository"),
    ("Repo", "repository"),
    ("Dao", "repository"),
    ("Decorator", "decorator"),
    ("Singleton", "singleton"),
    ("Visitor", "visitor"),
    ("Command", "command"),
    ("Controller", "mvc"),
];

/// Method names typical of a subject in the observer pattern.
const OBSERVER_METHODS: &[&str] = &["subscribe", "unsubscribe", "attach", "detach", "notify", "add_listener", "addListener"];

/// Run every single-file check on a module.
pub fn recognize_file(
    module: &CodeEntity,
    text: &str,
    language: Language,
    thresholds: &PatternThresholds,
) -> Vec<Pattern> {
    let mut patterns = Vec::new();
    if !language.is_code() {
        return patterns;
    }

    check_naming(module, thresholds, &mut patterns);
    check_cohesion(module, text, thresholds, &mut patterns);
    check_layout(module, language, &mut patterns);
    for (label, class) in design_hints(module) {
        patterns.push(
            Pattern::new(PatternKind::StructuralPattern, label, vec![class.to_ref()])
                .with_confidence(0.6)
                .with_note(format!("class {} suggests the {} pattern", class.name, label)),
        );
    }

    sort_patterns(&mut patterns);
    patterns
}

fn check_naming(module: &CodeEntity, thresholds: &PatternThresholds, out: &mut Vec<Pattern>) {
    let named = function_styles(module);
    if named.len() < thresholds.min_naming_samples.max(1) {
        return;
    }
    let styles: Vec<_> = named.iter().map(|(_, s)| *s).collect();
    let Some(dominant) = dominant_style(&styles) else {
        return;
    };

    let (conforming, deviating): (Vec<_>, Vec<_>) =
        named.iter().partition(|(_, style)| style.conforms_to(dominant));
    let share = conforming.len() as f64 / named.len() as f64;

    if deviating.is_empty() {
        out.push(
            Pattern::new(
                PatternKind::NamingConvention,
                format!("consistent {} function names", dominant),
                conforming.iter().map(|(e, _)| e.to_ref()).collect(),
            )
            .with_confidence(share)
            .with_note(format!("{} of {} function names follow {}", conforming.len(), named.len(), dominant))
            .capped(),
        );
    } else {
        let names: Vec<_> = deviating.iter().map(|(e, s)| format!("{} ({})", e.name, s)).collect();
        out.push(
            Pattern::new(
                PatternKind::AntiPattern,
                "mixed function naming",
                deviating.iter().map(|(e, _)| e.to_ref()).collect(),
            )
            .with_confidence(share)
            .with_note(format!(
                "{} of {} function names follow {}; deviating: {}",
                conforming.len(),
                named.len(),
                dominant,
                names.join(", ")
            ))
            .capped(),
        );
    }
}

fn check_cohesion(module: &CodeEntity, text: &str, thresholds: &PatternThresholds, out: &mut Vec<Pattern>) {
    let definitions = module
        .children
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Class | EntityKind::Function))
        .count();
    let lines = line_count(text);

    if definitions > thresholds.max_module_entities || lines > thresholds.max_module_lines {
        let mut reasons = Vec::new();
        if definitions > thresholds.max_module_entities {
            reasons.push(format!(
                "{} top-level definitions (max {})",
                definitions, thresholds.max_module_entities
            ));
        }
        if lines > thresholds.max_module_lines {
            reasons.push(format!("{} lines (max {})", lines, thresholds.max_module_lines));
        }
        out.push(
            Pattern::new(PatternKind::AntiPattern, "god module", vec![module.to_ref()])
                .with_note(reasons.join(", ")),
        );
    }

    for class in module.all_classes() {
        let methods = class.functions().count();
        if methods > thresholds.max_class_methods {
            out.push(
                Pattern::new(PatternKind::AntiPattern, "god class", vec![class.to_ref()]).with_note(format!(
                    "class {} has {} methods (max {})",
                    class.name, methods, thresholds.max_class_methods
                )),
            );
        }
    }

    for function in module.all_functions() {
        let length = function.span.lines();
        if length > thresholds.max_function_lines {
            out.push(
                Pattern::new(PatternKind::AntiPattern, "long function", vec![function.to_ref()]).with_note(
                    format!(
                        "{} spans {} lines (max {})",
                        function.name, length, thresholds.max_function_lines
                    ),
                ),
            );
        }
    }
}

fn check_layout(module: &CodeEntity, language: Language, out: &mut Vec<Pattern>) {
    let first_definition = module
        .children
        .iter()
        .filter(|e| matches!(e.kind, EntityKind::Class | EntityKind::Function))
        .map(|e| e.span.start)
        .min();

    if let Some(first) = first_definition {
        let late: Vec<_> = module
            .imports()
            .filter(|i| i.span.start > first)
            .map(|i| i.to_ref())
            .collect();
        if !late.is_empty() {
            out.push(
                Pattern::new(PatternKind::AntiPattern, "imports not at top", late)
                    .with_note(format!("imports follow the first definition at line {}", first)),
            );
        }

        if language == Language::Python && module.doc.is_none() {
            out.push(
                Pattern::new(PatternKind::AntiPattern, "missing module docstring", vec![module.to_ref()])
                    .with_confidence(0.5)
                    .with_note("module defines classes or functions but has no docstring"),
            );
        }
    }
}

/// Design pattern hints from class names and observer-style methods, in
/// source order.
pub fn design_hints(module: &CodeEntity) -> Vec<(&'static str, &CodeEntity)> {
    let mut hints = Vec::new();
    for class in module.all_classes() {
        if let Some((_, label)) = NAME_HINTS.iter().find(|(suffix, _)| class.name.ends_with(suffix)) {
            hints.push((*label, class));
            continue;
        }
        let observer_methods = class
            .functions()
            .filter(|m| OBSERVER_METHODS.contains(&m.name.as_str()))
            .count();
        if observer_methods >= 2 {
            hints.push(("observer", class));
        }
    }
    hints
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LineSpan;

    fn function(name: &str, start: usize, end: usize) -> CodeEntity {
        CodeEntity::new(EntityKind::Function, name, "m.py", LineSpan::new(start, end))
    }

    fn module(children: Vec<CodeEntity>) -> CodeEntity {
        let mut m = CodeEntity::new(EntityKind::Module, "m", "m.py", LineSpan::new(1, 200));
        m.children = children;
        m
    }

    #[test]
    fn test_consistent_naming() {
        let m = module(vec![function("load_config", 1, 2), function("save", 3, 4)]);
        let patterns = recognize_file(&m, "", Language::JavaScript, &PatternThresholds::default());
        let naming = patterns
            .iter()
            .find(|p| p.kind == PatternKind::NamingConvention)
            .expect("naming convention");
        assert_eq!(naming.label, "consistent snake_case function names");
        assert_eq!(naming.evidence.len(), 2);
        assert_eq!(naming.confidence, 1.0);
    }

    #[test]
    fn test_mixed_naming_lists_deviants() {
        let m = module(vec![
            function("load_config", 1, 2),
            function("save_config", 3, 4),
            function("parseArgs", 5, 6),
        ]);
        let patterns = recognize_file(&m, "", Language::JavaScript, &PatternThresholds::default());
        let mixed = patterns
            .iter()
            .find(|p| p.label == "mixed function naming")
            .expect("mixed naming");
        assert_eq!(mixed.kind, PatternKind::AntiPattern);
        assert_eq!(mixed.evidence.len(), 1);
        assert_eq!(mixed.evidence[0].name, "parseArgs");
    }

    #[test]
    fn test_single_function_makes_no_naming_claim() {
        let m = module(vec![function("foo", 1, 2)]);
        let patterns = recognize_file(&m, "", Language::JavaScript, &PatternThresholds::default());
        assert!(patterns.iter().all(|p| p.kind != PatternKind::NamingConvention));
    }

    #[test]
    fn test_god_class_and_long_function() {
        let mut class = CodeEntity::new(EntityKind::Class, "Everything", "m.py", LineSpan::new(1, 150));
        for i in 0..4 {
            class.children.push(function(&format!("m{}", i), 2 + i, 2 + i));
        }
        let m = module(vec![class, function("huge", 151, 200)]);
        let thresholds = PatternThresholds {
            max_class_methods: 3,
            max_function_lines: 40,
            ..PatternThresholds::default()
        };
        let patterns = recognize_file(&m, "", Language::Java, &thresholds);
        assert!(patterns.iter().any(|p| p.label == "god class" && p.evidence[0].name == "Everything"));
        assert!(patterns.iter().any(|p| p.label == "long function" && p.evidence[0].name == "huge"));
    }

    #[test]
    fn test_late_imports_and_missing_docstring() {
        let late_import = CodeEntity::new(EntityKind::Import, "os", "m.py", LineSpan::new(10, 10));
        let m = module(vec![function("main", 1, 5), late_import]);
        let patterns = recognize_file(&m, "", Language::Python, &PatternThresholds::default());
        assert!(patterns.iter().any(|p| p.label == "imports not at top"));
        assert!(patterns.iter().any(|p| p.label == "missing module docstring"));
    }

    #[test]
    fn test_design_hints() {
        let factory = CodeEntity::new(EntityKind::Class, "WidgetFactory", "m.py", LineSpan::new(1, 3));
        let mut bus = CodeEntity::new(EntityKind::Class, "EventBus", "m.py", LineSpan::new(4, 9));
        bus.children.push(function("subscribe", 5, 6));
        bus.children.push(function("notify", 7, 8));
        let m = module(vec![factory, bus]);

        let hints: Vec<_> = design_hints(&m).into_iter().map(|(l, c)| (l, c.name.clone())).collect();
        assert_eq!(
            hints,
            vec![("factory", "WidgetFactory".to_string()), ("observer", "EventBus".to_string())]
        );
    }

    #[test]
    fn test_non_code_files_have_no_patterns() {
        let m = module(vec![function("a_b", 1, 2), function("cD", 3, 4)]);
        assert!(recognize_file(&m, "", Language::Markdown, &PatternThresholds::default()).is_empty());
    }
}
