//! Introductory workshop notebook.
//!
//! A small, dependency-free Python notebook handed out at the start of a
//! workshop day, before the walkthrough notebooks.

use crate::notebook::Notebook;
use chrono::NaiveDate;

/// File name for a workshop day's sample notebook, e.g. `2025-07-16-workshop.ipynb`.
pub fn sample_file_name(date: NaiveDate) -> String {
    format!("{}-workshop.ipynb", date.format("%Y-%m-%d"))
}

/// Build the sample notebook for a workshop day.
pub fn sample_notebook(date: NaiveDate) -> Notebook {
    let mut nb = Notebook::new();

    nb.push_markdown(format!(
        "# Workshop Notebook - {}

Welcome to today's workshop! This notebook contains some basic examples to get started.

## Overview
- Basic Python operations
- Simple calculations
- String manipulation",
        date.format("%B %-d, %Y")
    ));

    nb.push_code(
        r#"# Classic Hello World
print("Hello, World!")
print("Welcome to the workshop!")"#,
    );

    nb.push_markdown(
        "## Basic Mathematics

Let's perform some simple calculations:",
    );

    nb.push_code(
        r#"# Basic arithmetic operations
a = 42
b = 17
c = a + b

print(f"{a} + {b} = {c}")
print(f"{a} - {b} = {a - b}")
print(f"{a} * {b} = {a * b}")
print(f"{a} / {b} = {a / b:.2f}")"#,
    );

    nb.push_markdown(
        "## Working with Lists

Python lists are versatile data structures:",
    );

    nb.push_code(
        r#"# Working with lists
numbers = [1, 2, 3, 4, 5]
print("Original list:", numbers)

# Add more numbers
numbers.extend([6, 7, 8, 9, 10])
print("Extended list:", numbers)

# Calculate sum and average
total = sum(numbers)
average = total / len(numbers)

print(f"Sum: {total}")
print(f"Average: {average}")
print(f"Max: {max(numbers)}")
print(f"Min: {min(numbers)}")"#,
    );

    nb.push_markdown(
        "## Creating Functions

Let's define some simple functions:",
    );

    nb.push_code(
        r#"# Define a simple function
def greet(name):
    return f"Hello, {name}! Welcome to the workshop."

def calculate_area(length, width):
    return length * width

# Use the functions
print(greet("Python Developer"))
print(f"Area of a 5x3 rectangle: {calculate_area(5, 3)} square units")"#,
    );

    nb.push_markdown(
        "## Next Steps

Feel free to add your own cells below and experiment with Python!

Some ideas to try:
- Create a function that calculates fibonacci numbers
- Work with dictionaries
- Try list comprehensions
- Import and use external libraries",
    );

    nb.push_code("# Your code here\n");

    nb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::CellType;

    fn workshop_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 16).unwrap()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(sample_file_name(workshop_day()), "2025-07-16-workshop.ipynb");
    }

    #[test]
    fn test_sample_layout() {
        let nb = sample_notebook(workshop_day());
        assert_eq!(nb.cells.len(), 10);
        assert!(nb.cells[0]
            .source_text()
            .starts_with("# Workshop Notebook - July 16, 2025\n"));

        let types: Vec<CellType> = nb.cells.iter().map(|c| c.cell_type()).collect();
        for (i, t) in types.iter().enumerate() {
            let expected = if i % 2 == 0 { CellType::Markdown } else { CellType::Code };
            assert_eq!(*t, expected, "cell {}", i);
        }
        assert_eq!(nb.cells[9].source_text(), "# Your code here\n");
    }

    #[test]
    fn test_single_digit_day_is_not_padded() {
        let nb = sample_notebook(NaiveDate::from_ymd_opt(2025, 5, 7).unwrap());
        assert!(nb.cells[0].source_text().contains("May 7, 2025"));
    }
}
