// Copyright © 2026 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Redis-compatible glob matching for `SCAN MATCH`.
//!
//! Supports `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.

const SPECIAL: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Escapes glob metacharacters so `literal` only matches itself.
pub fn escape(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Pattern matching every key that starts with `prefix`.
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = escape(prefix);
    pattern.push('*');
    pattern
}

pub fn glob_match(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();

    let (mut pi, mut ki) = (0, 0);
    // Pattern index just after the last `*`, and the key index it is retrying from.
    let mut star: Option<(usize, usize)> = None;

    loop {
        if pi < p.len() {
            if p[pi] == '*' {
                while pi < p.len() && p[pi] == '*' {
                    pi += 1;
                }
                if pi == p.len() {
                    return true;
                }
                star = Some((pi, ki));
                continue;
            }
            if ki < k.len() {
                if let Some(next) = match_one(&p, pi, k[ki]) {
                    pi = next;
                    ki += 1;
                    continue;
                }
            }
        } else if ki == k.len() {
            return true;
        }

        match star {
            Some((sp, sk)) if sk < k.len() => {
                star = Some((sp, sk + 1));
                pi = sp;
                ki = sk + 1;
            }
            _ => return false,
        }
    }
}

/// Matches the single pattern element at `pi` against `c`, returning the
/// index of the next element on success.
fn match_one(p: &[char], pi: usize, c: char) -> Option<usize> {
    match p[pi] {
        '?' => Some(pi + 1),
        '\\' if pi + 1 < p.len() => (p[pi + 1] == c).then_some(pi + 2),
        '[' => match class_end(p, pi + 1) {
            Some(close) => class_matches(&p[pi + 1..close], c).then_some(close + 1),
            None => (c == '[').then_some(pi + 1),
        },
        literal => (literal == c).then_some(pi + 1),
    }
}

fn class_end(p: &[char], start: usize) -> Option<usize> {
    let mut i = start;
    if i < p.len() && p[i] == '^' {
        i += 1;
    }
    while i < p.len() {
        match p[i] {
            '\\' => i += 2,
            ']' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn class_matches(class: &[char], c: char) -> bool {
    let (negate, body) = match class.first() {
        Some('^') => (true, &class[1..]),
        _ => (false, class),
    };

    let mut matched = false;
    let mut i = 0;
    while i < body.len() {
        if body[i] == '\\' && i + 1 < body.len() {
            matched |= body[i + 1] == c;
            i += 2;
        } else if i + 2 < body.len() && body[i + 1] == '-' {
            let (lo, hi) = if body[i] <= body[i + 2] {
                (body[i], body[i + 2])
            } else {
                (body[i + 2], body[i])
            };
            matched |= lo <= c && c <= hi;
            i += 3;
        } else {
            matched |= body[i] == c;
            i += 1;
        }
    }

    matched != negate
}
