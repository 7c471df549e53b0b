//! Prompt templates for every model call in the pipeline.

use mentor_core::Topic;

pub fn parser(input_text: &str) -> String {
    format!(
        "You are a Math Parser.\n\
         1. Fix any typos in the text below.\n\
         2. Rewrite it as a clean, self-contained math problem.\n\
         3. Output STRICT JSON.\n\
         \n\
         Input: \"{input_text}\"\n\
         \n\
         JSON Schema:\n\
         {{\n\
         \x20   \"problem_text\": \"The full cleaned text of the problem\",\n\
         \x20   \"topic\": \"Your guess at the topic (Algebra, Probability, Calculus, ...)\",\n\
         \x20   \"needs_clarification\": false\n\
         }}\n\
         \n\
         Do NOT add markdown. Output ONLY the JSON object."
    )
}

pub fn router(problem_text: &str) -> String {
    let categories: Vec<&str> = Topic::ALL.iter().map(|t| t.token()).collect();
    format!(
        "You are a Senior Math Classifier.\n\
         Classify the following math problem into ONE of these categories:\n\
         [{}]\n\
         \n\
         Problem: \"{problem_text}\"\n\
         \n\
         Rules:\n\
         - derivatives, integrals, limits, rates of change -> CALCULUS\n\
         - matrices, vectors, eigenvalues -> LINEAR_ALGEBRA\n\
         - chance, dice, coins, distributions -> PROBABILITY\n\
         - shapes, angles, areas, volumes -> GEOMETRY\n\
         - equations, polynomials, complex numbers -> ALGEBRA\n\
         \n\
         Output ONLY the category name. Do not explain.",
        categories.join(", ")
    )
}

pub fn numeric_code(problem_text: &str) -> String {
    format!(
        "You are a Python Math Engineer. Write a script that computes the numerical answer.\n\
         Problem: {problem_text}\n\
         \n\
         Rules:\n\
         1. Only basic arithmetic and the math module: math.comb(n, k), math.factorial(n), ...\n\
         2. fractions.Fraction is available for exact ratios.\n\
         3. Print the final result.\n\
         4. Output ONLY code inside ```python ... ```"
    )
}

pub fn symbolic_code(problem_text: &str) -> String {
    format!(
        "You are a Symbolic Math Expert using the Python library SymPy.\n\
         Problem: {problem_text}\n\
         \n\
         Task: write a SymPy script that solves this analytically.\n\
         \n\
         Reference:\n\
         - Symbols: x, y, z = symbols('x y z')\n\
         - Functions: y = Function('y')(x)\n\
         - Derivative: diff(f, x) or y.diff(x)\n\
         - Differential equation: eqn = Eq(y.diff(x) + y, x); dsolve(eqn, y)\n\
         - Indefinite integral: integrate(x**2, x)\n\
         - Definite integral: integrate(x**2, (x, 0, 1))\n\
         \n\
         Example for \"Solve dy/dx = x + y\":\n\
         ```python\n\
         from sympy import symbols, Function, dsolve, Eq\n\
         x = symbols('x')\n\
         y = Function('y')(x)\n\
         sol = dsolve(Eq(y.diff(x), x + y), y)\n\
         print(sol)\n\
         ```\n\
         \n\
         Rules:\n\
         1. Define every symbol you use.\n\
         2. Print the final result.\n\
         3. Output ONLY code inside ```python ... ``` blocks."
    )
}

pub fn solve(problem_text: &str, context: &str) -> String {
    format!(
        "Solve this math problem step-by-step.\n\
         Context: {context}\n\
         Problem: {problem_text}"
    )
}

pub fn verifier(problem_text: &str, solution: &str) -> String {
    format!(
        "Verify this math solution.\n\
         Problem: {problem_text}\n\
         Solution: {solution}\n\
         Strictly check for logical errors. Output 'VERIFIED_CORRECT' or 'VERIFIED_INCORRECT'."
    )
}

pub fn explainer(problem_text: &str, solution: &str) -> String {
    format!(
        "Explain this solution to a student.\n\
         Problem: {problem_text}\n\
         Solution: {solution}"
    )
}
