use std::path::Path;

use serde::Serialize;

use crate::KnitError;
use crate::KnitProps;
use crate::KnitResult;

/// Header of every knitted sample.
pub const KNIT_INCLUDE_TEMPLATE: &str = "\
// This file was automatically generated from {{ file.name }} by Knit tool. Do not edit.
package {{ knit.package }}.{{ knit.name }}
";

/// Layout of a generated test file.
pub const KNIT_TEST_TEMPLATE: &str = r#"// This file was automatically generated from {{ file.name }} by Knit tool. Do not edit.
package {{ test.package }}

import org.junit.Test
import kotlinx.knit.test.*

class {{ test.name }} {
{% for case in cases %}

    @Test
    fun test{{ case.name }}() {
{% if case.method %}
        captureOutput("{{ case.name }}") { {{ case.knit.package }}.{{ case.knit.name }}.main() }.{{ case.method }}(
{% for line in case.lines %}
            "{{ line }}"{{ "," if not loop.last else "" }}
{% endfor %}
        )
{% else %}
        captureOutput("{{ case.name }}") { {{ case.knit.package }}.{{ case.knit.name }}.main() }.also { lines ->
            check({{ case.predicate }})
        }
{% endif %}
    }
{% endfor %}
}
"#;

/// Property values starting with this marker name a bundled template.
pub const BUNDLED_TEMPLATE_MARKER: char = '@';

/// Template details shared by every rendering context.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
	pub name: String,
	pub path: String,
}

impl FileInfo {
	pub fn new(path: &Path) -> Self {
		Self {
			name: path
				.file_name()
				.map(|name| name.to_string_lossy().into_owned())
				.unwrap_or_default(),
			path: path.display().to_string(),
		}
	}
}

/// Render the template named by the `property` property into lines,
/// dropping trailing blank lines.
pub fn render_template_lines<S: Serialize>(
	props: &KnitProps,
	property: &str,
	context: &S,
) -> KnitResult<Vec<String>> {
	let value = props.get_value(property)?;
	let source = match value.strip_prefix(BUNDLED_TEMPLATE_MARKER) {
		Some(name) => bundled_template(name)?.to_string(),
		None => {
			let path = props.get_file(property)?;
			std::fs::read_to_string(&path).map_err(|source| {
				KnitError::FileIo {
					path: path.display().to_string(),
					source,
				}
			})?
		}
	};

	let rendered = render_template(&source, context)?;
	let mut lines: Vec<String> = rendered.lines().map(ToString::to_string).collect();

	while lines.last().is_some_and(|line| line.trim().is_empty()) {
		lines.pop();
	}

	Ok(lines)
}

/// Render `content` with block tags trimmed, so control statements on their
/// own lines leave no blank lines behind.
pub fn render_template<S: Serialize>(content: &str, context: &S) -> KnitResult<String> {
	let mut env = minijinja::Environment::new();
	env.set_keep_trailing_newline(true);
	env.set_trim_blocks(true);
	env.set_lstrip_blocks(true);
	env.add_template("__knit__", content)
		.map_err(|e| KnitError::TemplateRender(e.to_string()))?;

	let template = env
		.get_template("__knit__")
		.map_err(|e| KnitError::TemplateRender(e.to_string()))?;

	template
		.render(minijinja::Value::from_serialize(context))
		.map_err(|e| KnitError::TemplateRender(e.to_string()))
}

fn bundled_template(name: &str) -> KnitResult<&'static str> {
	match name {
		"knit-include" => Ok(KNIT_INCLUDE_TEMPLATE),
		"knit-test" => Ok(KNIT_TEST_TEMPLATE),
		_ => Err(KnitError::TemplateRender(format!("unknown bundled template `@{name}`"))),
	}
}
