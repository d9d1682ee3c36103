pub mod handler_404;
