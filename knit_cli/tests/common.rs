#![allow(dead_code)]

use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn knit_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("knit"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

pub const PROPERTIES: &str = "knit.dir=example/\ntest.dir=test/\n";

pub const README: &str = "<!--- TEST_NAME ReadmeTest -->

# Hello

```kotlin
fun main() {
    println(\"Hello\")
}
```

> You can get the full code [here](example/example-hello-01.kt).

```text
Hello
```

<!--- TEST -->
";

/// A project with one document producing one sample and one test.
pub fn write_project(root: &Path) -> std::io::Result<()> {
	std::fs::write(root.join("knit.properties"), PROPERTIES)?;
	std::fs::write(root.join("README.md"), README)
}
