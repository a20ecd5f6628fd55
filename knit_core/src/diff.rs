//! Line diff rendered in the classic `diff` output format.
//!
//! The edit script is computed with the greedy O(ND) algorithm from Myers'
//! "An O(ND) Difference Algorithm and Its Variations". The common prefix and
//! suffix are stripped first, so small edits to large files stay cheap.

/// Largest edit distance [`format_diff`] will compute. Beyond it the diff is
/// reported as too large instead of being computed.
pub const MAX_DIFF_EDITS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffOp {
	Insert,
	Delete,
	Change,
}

impl DiffOp {
	fn marker(self) -> char {
		match self {
			Self::Insert => '>',
			Self::Delete => '<',
			Self::Change => '-',
		}
	}

	fn command(self) -> char {
		match self {
			Self::Insert => 'a',
			Self::Delete => 'd',
			Self::Change => 'c',
		}
	}
}

/// A single line edit. `x` and `y` are zero based and may be `-1` when the
/// edit happens before the first line.
#[derive(Debug, Clone, Copy)]
struct Edit<'a> {
	x: isize,
	y: isize,
	op: DiffOp,
	line: &'a str,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
	x: isize,
	y: isize,
	op: DiffOp,
}

impl Edit<'_> {
	fn anchor(&self) -> Anchor {
		Anchor {
			x: self.x,
			y: self.y,
			op: self.op,
		}
	}
}

/// Render the differences between `old` and `new`.
///
/// Returns an empty string when both are equal and `None` when the edit
/// distance exceeds [`MAX_DIFF_EDITS`].
///
/// ```rust
/// use knit_core::format_diff;
///
/// let diff = format_diff(&["a", "b", "c"], &["a", "b", "c", "d"]);
/// assert_eq!(diff.as_deref(), Some("3a4\n> d"));
/// ```
pub fn format_diff<S: AsRef<str>>(old: &[S], new: &[S]) -> Option<String> {
	let edits = compute_diff(old, new)?;
	let mut out: Vec<String> = Vec::with_capacity(edits.len() * 2);
	let mut group: Option<(usize, Anchor, Anchor)> = None;
	let mut prev_op: Option<DiffOp> = None;
	let mut prev_pos = 0;

	for edit in &edits {
		let pos = if edit.op == DiffOp::Delete { edit.x } else { edit.y };

		if prev_op != Some(edit.op) || pos != prev_pos + 1 {
			match &mut group {
				Some((_, first, last))
					if prev_op == Some(DiffOp::Delete)
						&& edit.op == DiffOp::Insert
						&& edit.x == last.x =>
				{
					*first = Anchor {
						x: first.x,
						y: edit.y,
						op: DiffOp::Change,
					};
					*last = edit.anchor();
					out.push("---".to_string());
				}
				_ => {
					flush_header(&mut out, group.take());
					group = Some((out.len(), edit.anchor(), edit.anchor()));
					out.push(String::new());
				}
			}
		} else if let Some((_, _, last)) = &mut group {
			*last = edit.anchor();
		}

		out.push(format!("{} {}", edit.op.marker(), edit.line));
		prev_op = Some(edit.op);
		prev_pos = pos;
	}

	flush_header(&mut out, group);
	Some(out.join("\n"))
}

fn flush_header(out: &mut [String], group: Option<(usize, Anchor, Anchor)>) {
	if let Some((index, first, last)) = group {
		out[index] = format!(
			"{}{}{}",
			format_range(first.x + 1, last.x + 1),
			first.op.command(),
			format_range(first.y + 1, last.y + 1)
		);
	}
}

fn format_range(start: isize, end: isize) -> String {
	if start == end {
		start.to_string()
	} else {
		format!("{start},{end}")
	}
}

fn compute_diff<'a, S: AsRef<str>>(xs: &'a [S], ys: &'a [S]) -> Option<Vec<Edit<'a>>> {
	let max_prefix = xs.len().min(ys.len());
	let mut prefix = 0;
	while prefix < max_prefix && xs[prefix].as_ref() == ys[prefix].as_ref() {
		prefix += 1;
	}

	let max_suffix = max_prefix - prefix;
	let mut suffix = 0;
	while suffix < max_suffix
		&& xs[xs.len() - 1 - suffix].as_ref() == ys[ys.len() - 1 - suffix].as_ref()
	{
		suffix += 1;
	}

	compute_middle(xs, prefix, xs.len() - suffix, ys, prefix, ys.len() - suffix)
}

fn compute_middle<'a, S: AsRef<str>>(
	xs: &'a [S],
	x1: usize,
	x2: usize,
	ys: &'a [S],
	y1: usize,
	y2: usize,
) -> Option<Vec<Edit<'a>>> {
	if x1 == x2 {
		return Some(
			(y1..y2)
				.map(|y| {
					Edit {
						x: x1 as isize - 1,
						y: y as isize,
						op: DiffOp::Insert,
						line: ys[y].as_ref(),
					}
				})
				.collect(),
		);
	}

	if y1 == y2 {
		return Some(
			(x1..x2)
				.map(|x| {
					Edit {
						x: x as isize,
						y: y1 as isize - 1,
						op: DiffOp::Delete,
						line: xs[x].as_ref(),
					}
				})
				.collect(),
		);
	}

	let max_d = (x2 - x1 + y2 - y1).min(MAX_DIFF_EDITS);
	// Diagonal `k` holds the points where `x - y + kd == k`.
	let kd = y1 as isize - x1 as isize;
	// Furthest reaching `x` for every diagonal of every previous `d`.
	let mut frontiers: Vec<Vec<usize>> = Vec::new();

	for d in 0..=max_d {
		let di = d as isize;
		let mut current = vec![0; 2 * d + 1];
		let mut k = -di;

		while k <= di {
			let mut x = match frontiers.last() {
				None => x1,
				Some(prev) => {
					if takes_insert(prev, di, k) {
						prev[(di + k) as usize]
					} else {
						prev[(di + k - 2) as usize] + 1
					}
				}
			};
			let mut y = x as isize + kd - k;

			while x < x2 && y >= 0 && (y as usize) < y2 && xs[x].as_ref() == ys[y as usize].as_ref() {
				x += 1;
				y += 1;
			}

			current[(di + k) as usize] = x;

			if x >= x2 && y >= y2 as isize {
				return Some(build_script(xs, x1, ys, y1, d, k, &frontiers));
			}

			k += 2;
		}

		frontiers.push(current);
	}

	None
}

/// Whether the furthest point on diagonal `k` is reached by moving down
/// from diagonal `k + 1` rather than right from `k - 1`.
fn takes_insert(prev: &[usize], d: isize, k: isize) -> bool {
	k == -d || (k != d && prev[(d + k - 2) as usize] < prev[(d + k) as usize])
}

fn build_script<'a, S: AsRef<str>>(
	xs: &'a [S],
	x1: usize,
	ys: &'a [S],
	y1: usize,
	d0: usize,
	k0: isize,
	frontiers: &[Vec<usize>],
) -> Vec<Edit<'a>> {
	let kd = y1 as isize - x1 as isize;
	let mut edits = Vec::with_capacity(d0);
	let mut k = k0;

	for d in (1..=d0).rev() {
		let di = d as isize;
		let prev = &frontiers[d - 1];

		if takes_insert(prev, di, k) {
			let x = prev[(di + k) as usize] as isize - 1;
			let y = x + kd - k;
			edits.push(Edit {
				x,
				y,
				op: DiffOp::Insert,
				line: ys[y as usize].as_ref(),
			});
			k += 1;
		} else {
			let x = prev[(di + k - 2) as usize] as isize;
			let y = x + kd - k;
			edits.push(Edit {
				x,
				y,
				op: DiffOp::Delete,
				line: xs[x as usize].as_ref(),
			});
			k -= 1;
		}
	}

	edits.reverse();
	edits
}
