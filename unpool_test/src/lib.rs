pub mod relatively_close;
