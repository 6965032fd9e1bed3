use pretty_assertions::assert_eq;
use pyshift_core::rules::{MoveToSubmodule, QualifyImported, RenameAttribute};
use pyshift_core::{DiagnosticKind, Engine, RuleFamily, RuleSet, SourceOutcome};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn engine() -> Result<Engine, Box<dyn std::error::Error>> {
    let mut rules = RuleSet::new();
    rules.add(
        RenameAttribute::new("wx", vec![("Color".to_string(), "Colour".to_string())])
            .into_rule("color-to-colour", "wx.Color is now wx.Colour")?,
    )?;
    rules.add(
        MoveToSubmodule::new("wx", "adv", vec!["DP_ALLOWNONE".to_string()])
            .into_rule("adv-constants", "date picker constants moved to wx.adv")?,
    )?;
    rules.add(
        MoveToSubmodule::new("wx", "adv", vec!["DatePickerCtrl".to_string()])
            .into_rule("adv-widgets", "date picker widgets moved to wx.adv")?,
    )?;
    rules.add(
        QualifyImported::new("wx", vec![("EmptyIcon".to_string(), "Icon".to_string())])
            .into_rule("empty-icon", "EmptyIcon is now Icon")?,
    )?;
    Ok(Engine::new(rules))
}

fn has(outcome: &SourceOutcome, kind: DiagnosticKind) -> bool {
    outcome.diagnostics.iter().any(|diagnostic| diagnostic.kind == kind)
}

#[test]
fn test_import_requested_by_two_rules_is_added_once() -> TestResult {
    let outcome = engine()?.transform_source("a = wx.DP_ALLOWNONE\nb = wx.DatePickerCtrl(p)\n")?;
    assert_eq!(
        outcome.output,
        "import wx.adv\n\na = wx.adv.DP_ALLOWNONE\nb = wx.adv.DatePickerCtrl(p)\n"
    );
    assert_eq!(outcome.output.matches("import wx.adv").count(), 1);
    Ok(())
}

#[test]
fn test_import_goes_after_module_docstring() -> TestResult {
    let outcome = engine()?.transform_source("\"\"\"Dialogs.\"\"\"\n\nx = wx.DP_ALLOWNONE\n")?;
    assert_eq!(
        outcome.output,
        "\"\"\"Dialogs.\"\"\"\nimport wx.adv\n\nx = wx.adv.DP_ALLOWNONE\n"
    );
    Ok(())
}

#[test]
fn test_import_appended_after_existing_block() -> TestResult {
    let source = "import os\nimport wx  # gui\n\nx = wx.DP_ALLOWNONE\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(
        outcome.output,
        "import os\nimport wx  # gui\nimport wx.adv\n\nx = wx.adv.DP_ALLOWNONE\n"
    );
    Ok(())
}

#[test]
fn test_function_local_rebinding_is_left_alone() -> TestResult {
    let source = "import wx\n\ndef paint():\n    wx = load()\n    return wx.Color(1)\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(outcome.output, source);
    assert!(has(&outcome, DiagnosticKind::ShadowedName));
    Ok(())
}

#[test]
fn test_parameter_shadowing_is_left_alone() -> TestResult {
    let source = "import wx\n\ndef paint(wx):\n    return wx.Color(1)\n\nc = wx.Color(2)\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(
        outcome.output,
        "import wx\n\ndef paint(wx):\n    return wx.Color(1)\n\nc = wx.Colour(2)\n"
    );
    Ok(())
}

#[test]
fn test_class_attribute_does_not_shadow_inside_methods() -> TestResult {
    let source = "import wx\n\nclass Panel:\n    wx = None\n\n    def paint(self):\n        return wx.Color(1)\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(
        outcome.output,
        "import wx\n\nclass Panel:\n    wx = None\n\n    def paint(self):\n        return wx.Colour(1)\n"
    );
    Ok(())
}

#[test]
fn test_module_level_rebinding_is_left_alone() -> TestResult {
    let source = "import wx\nwx = None\nwx.Color(1)\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(outcome.output, source);
    assert!(has(&outcome, DiagnosticKind::ShadowedName));
    Ok(())
}

#[test]
fn test_aliased_module_is_followed() -> TestResult {
    let outcome = engine()?.transform_source("import wx as w\n\nw.Color(1)\nwx.Color(2)\n")?;
    assert_eq!(outcome.output, "import wx as w\n\nw.Colour(1)\nwx.Color(2)\n");
    Ok(())
}

#[test]
fn test_import_still_used_elsewhere_is_kept() -> TestResult {
    let source = "from wx import EmptyIcon\nimport wx\n\nicon = EmptyIcon()\nfactory = EmptyIcon\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(
        outcome.output,
        "from wx import EmptyIcon\nimport wx\n\nicon = wx.Icon()\nfactory = EmptyIcon\n"
    );
    assert!(has(&outcome, DiagnosticKind::ImportKept));
    Ok(())
}

#[test]
fn test_comments_and_spacing_survive() -> TestResult {
    let source = "import wx\n\n\n# pick a colour\nc = wx.Color( 1,  2 )  # red\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(
        outcome.output,
        "import wx\n\n\n# pick a colour\nc = wx.Colour( 1,  2 )  # red\n"
    );
    Ok(())
}

#[test]
fn test_import_goes_before_code_not_after_late_imports() -> TestResult {
    let outcome = engine()?.transform_source("import wx\nx = wx.DP_ALLOWNONE\nimport os\n")?;
    assert_eq!(
        outcome.output,
        "import wx\nimport wx.adv\nx = wx.adv.DP_ALLOWNONE\nimport os\n"
    );

    let outcome = engine()?.transform_source("from wx import EmptyIcon\nicon = EmptyIcon()\n\nimport os\n")?;
    assert_eq!(outcome.output, "import wx\nicon = wx.Icon()\n\nimport os\n");
    Ok(())
}

#[test]
fn test_replacing_an_import_after_code_keeps_lines_apart() -> TestResult {
    let outcome = engine()?.transform_source("x = 1\nfrom wx import EmptyIcon\nicon = EmptyIcon()\n")?;
    assert_eq!(outcome.output, "x = 1\nimport wx\nicon = wx.Icon()\n");
    Ok(())
}

#[test]
fn test_import_inside_try_block_is_reused() -> TestResult {
    let source = "try:\n    import wx\nexcept ImportError:\n    wx = None\nfrom wx import EmptyIcon\nicon = EmptyIcon()\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(
        outcome.output,
        "try:\n    import wx\nexcept ImportError:\n    wx = None\nicon = wx.Icon()\n"
    );
    assert_eq!(outcome.output.matches("import wx").count(), 1);
    Ok(())
}

#[test]
fn test_comprehension_variable_shadows_import() -> TestResult {
    let source = "from wx import EmptyIcon\nxs = [EmptyIcon() for EmptyIcon in fs]\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(outcome.output, source);
    assert!(has(&outcome, DiagnosticKind::ShadowedName));
    Ok(())
}

#[test]
fn test_lambda_parameter_shadows_module() -> TestResult {
    let source = "import wx\npaint = lambda wx: wx.Color(1)\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(outcome.output, source);
    Ok(())
}

#[test]
fn test_module_name_bound_to_a_value_is_not_qualified_through() -> TestResult {
    let source = "from wx import EmptyIcon\nwx = 3\nicon = EmptyIcon()\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(outcome.output, source);
    assert!(has(&outcome, DiagnosticKind::ShadowedName));
    Ok(())
}

#[test]
fn test_parameter_default_resolves_outside_the_function() -> TestResult {
    let source = "import wx\n\ndef paint(self, wx=wx.Color):\n    return wx.Color(1)\n";
    let outcome = engine()?.transform_source(source)?;
    assert_eq!(
        outcome.output,
        "import wx\n\ndef paint(self, wx=wx.Colour):\n    return wx.Color(1)\n"
    );
    Ok(())
}
