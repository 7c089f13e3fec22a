fn main() {
    pawley_plot::cli::run();
}
